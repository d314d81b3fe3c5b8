//! Process-wide server configuration and its client-visible projection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Themes a client may select through the `theme` cookie.
pub const THEMES: &[&str] = &[
    "ashita",
    "console",
    "egophobia",
    "gar",
    "glass",
    "gowno",
    "higan",
    "inumi",
    "mawaru",
    "moe",
    "moon",
    "ocean",
    "rave",
    "tavern",
    "tea",
    "win95",
];

const DEFAULT_FAQ: &str = "Supported upload file types are JPEG, PNG, APNG, WEBM, MP3, FLAC, MP4, OGG, PDF, ZIP, 7Z, TAR.GZ, TAR.XZ, RAR, CBZ, CBR.
<hr>Encase text in:
  ** for spoilers
  @@ for bold
  ~~ for italics
  ^r for red text
  ^b for blue text
  ^p for purple text
  `` for programing code highlighting
<hr>Hash commands:
#d100 #2d100 - Roll dice
#flip - Coin flip
#8ball - An 8ball
#sw24:30 #sw2:24:30 #sw24:30+30 #sw24:30-30 - \"Syncwatch\" synchronized time counter";

/// Returns whether `theme` names one of the bundled themes.
pub fn is_known_theme(theme: &str) -> bool {
    THEMES.contains(&theme)
}

/// Server-wide configuration.
///
/// Only [`GlobalPublic`] is ever disclosed to clients; everything else stays
/// server side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Days of inactivity before a board is pruned.
    pub board_expiry: u32,
    pub max_width: u16,
    pub max_height: u16,
    /// Days before a login session expires.
    pub session_expiry: u32,
    pub char_score: u32,
    pub post_creation_score: u32,
    pub image_score: u32,
    pub email_err_port: u16,
    pub salt: String,
    pub email_err_mail: String,
    pub email_err_pass: String,
    pub email_err_sub: String,
    pub feedback_email: String,
    #[serde(rename = "rootURL")]
    pub root_url: String,
    #[serde(rename = "FAQ")]
    pub faq: String,
    pub captcha_tags: Vec<String>,
    pub override_captcha_tags: BTreeMap<String, String>,
    pub public: GlobalPublic,
}

/// Client-visible subset of [`GlobalConfig`].
///
/// Field order is the serialization order; keep it stable, fingerprints
/// depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalPublic {
    #[serde(rename = "defaultCSS")]
    pub default_css: String,
    pub default_lang: String,
    pub thread_expiry_min: u32,
    pub thread_expiry_max: u32,
    /// Maximum upload size in MiB.
    pub max_size: u32,
    pub links: BTreeMap<String, String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            board_expiry: 7,
            max_width: 6000,
            max_height: 6000,
            session_expiry: 30,
            char_score: 170,
            post_creation_score: 15000,
            image_score: 15000,
            email_err_port: 587,
            salt: "LALALALALALALALALALALALALALALALALALALALA".to_string(),
            email_err_mail: "admin@email.com".to_string(),
            email_err_pass: "sluts".to_string(),
            email_err_sub: "smtp.gmail.com".to_string(),
            feedback_email: "admin@email.com".to_string(),
            root_url: "http://127.0.0.1".to_string(),
            faq: DEFAULT_FAQ.to_string(),
            captcha_tags: vec![
                "patchouli_knowledge".to_string(),
                "cirno".to_string(),
                "hakurei_reimu".to_string(),
            ],
            override_captcha_tags: BTreeMap::new(),
            public: GlobalPublic::default(),
        }
    }
}

impl GlobalConfig {
    /// Reject values the rest of the server cannot work with.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !is_known_theme(&self.public.default_css) {
            return Err(DomainError::validation(format!(
                "unknown theme `{}`",
                self.public.default_css
            )));
        }
        if self.public.thread_expiry_min > self.public.thread_expiry_max {
            return Err(DomainError::validation(
                "minimum thread expiry exceeds the maximum",
            ));
        }
        if self.session_expiry == 0 {
            return Err(DomainError::validation("session expiry must be positive"));
        }
        Ok(())
    }
}

impl Default for GlobalPublic {
    fn default() -> Self {
        Self {
            default_css: "moe".to_string(),
            default_lang: "en_GB".to_string(),
            thread_expiry_min: 7,
            thread_expiry_max: 14,
            max_size: 5,
            links: BTreeMap::from([("4chan".to_string(), "http://www.4chan.org/".to_string())]),
        }
    }
}
