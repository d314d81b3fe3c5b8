//! Response validators (`ETag` values).
//!
//! A page validator combines the render cache generation, the global
//! configuration fingerprint and the requester's position. The position is
//! part of the token because staff see moderation controls that anonymous
//! visitors do not; the fingerprint because theme and limits come from live
//! configuration.

use crate::domain::auth::ModerationLevel;

/// Build the weak validator for a rendered page.
///
/// Anonymous requesters get no position suffix.
pub fn format_validator(generation: u64, fingerprint: &str, level: ModerationLevel) -> String {
    if level == ModerationLevel::Anonymous {
        format!("W/\"{generation}-{fingerprint}\"")
    } else {
        format!("W/\"{generation}-{fingerprint}-{level}\"")
    }
}

/// Strong validator for a serialized configuration projection.
pub fn fingerprint_validator(fingerprint: &str) -> String {
    format!("\"{fingerprint}\"")
}

/// Whether an `If-None-Match` header value names `validator`.
///
/// The header may list several comma separated validators; each is compared
/// byte for byte.
pub fn matches_validator(if_none_match: Option<&str>, validator: &str) -> bool {
    if_none_match.is_some_and(|header| {
        header
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == validator)
    })
}
