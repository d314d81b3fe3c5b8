//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod seed;
pub mod sessions;
pub mod telemetry;
