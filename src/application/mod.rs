//! Application services layer.

pub mod auth;
pub mod boards;
pub mod delivery;
pub mod error;
pub mod events;
pub mod render;
pub mod settings;
