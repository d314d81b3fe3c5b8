//! Live-reloadable board configuration store with fingerprinted conditional
//! page delivery.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod store;
pub(crate) mod util;
