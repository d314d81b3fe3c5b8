//! Domain layer types and invariants.

pub mod auth;
pub mod boards;
pub mod error;
pub mod global;
