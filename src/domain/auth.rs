//! Requester identity and staff position types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Staff position of a requester relative to a board, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationLevel {
    /// No valid session.
    Anonymous,
    /// Logged in without a staff position on the board.
    User,
    Janitor,
    Moderator,
    #[serde(rename = "owner")]
    BoardOwner,
    Admin,
}

impl ModerationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ModerationLevel::Anonymous => "anonymous",
            ModerationLevel::User => "user",
            ModerationLevel::Janitor => "janitor",
            ModerationLevel::Moderator => "moderator",
            ModerationLevel::BoardOwner => "owner",
            ModerationLevel::Admin => "admin",
        }
    }

    pub fn is_staff(self) -> bool {
        self >= ModerationLevel::Janitor
    }
}

impl fmt::Display for ModerationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login credentials carried by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub session: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session: session.into(),
        }
    }

    /// A request without a user id carries no credentials at all.
    pub fn is_empty(&self) -> bool {
        self.user_id.is_empty()
    }
}
