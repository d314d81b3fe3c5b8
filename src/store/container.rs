//! Configuration values bundled with their serialized public projection.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{boards::BoardConfig, global::GlobalConfig};

use super::StoreError;

/// Length of a fingerprint token.
pub const FINGERPRINT_LEN: usize = 16;

/// Short printable digest of a serialized projection.
///
/// A change detector only: it is not meant to resist deliberate collisions.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut token = URL_SAFE_NO_PAD.encode(digest.as_slice());
    token.truncate(FINGERPRINT_LEN);
    token
}

/// Serialize a public projection and fingerprint the result.
pub(crate) fn encode_projection<T: Serialize>(value: &T) -> Result<(Bytes, String), StoreError> {
    let json = serde_json::to_vec(value).map_err(StoreError::Serialization)?;
    let hash = fingerprint(&json);
    Ok((Bytes::from(json), hash))
}

/// The current global configuration with its client JSON and fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalContainer {
    pub config: GlobalConfig,
    pub json: Bytes,
    pub hash: String,
}

impl GlobalContainer {
    pub(crate) fn build(config: GlobalConfig) -> Result<Self, StoreError> {
        let (json, hash) = encode_projection(&config.public)?;
        Ok(Self { config, json, hash })
    }
}

/// A board configuration with its client JSON and fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardContainer {
    pub config: BoardConfig,
    pub json: Bytes,
    pub hash: String,
}

impl BoardContainer {
    pub(crate) fn build(config: BoardConfig) -> Result<Self, StoreError> {
        let (json, hash) = encode_projection(&config.public)?;
        Ok(Self { config, json, hash })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn title(&self) -> &str {
        &self.config.public.title
    }
}
