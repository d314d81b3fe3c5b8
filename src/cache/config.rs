//! Render cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 512;

/// Render cache configuration from the `[render_cache]` settings section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderCacheConfig {
    /// Maximum cached thread variants. Board listings and catalogs are not
    /// counted.
    pub capacity: usize,
}

impl Default for RenderCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::RenderCacheSettings> for RenderCacheConfig {
    fn from(settings: &crate::config::RenderCacheSettings) -> Self {
        Self {
            capacity: settings.capacity.get(),
        }
    }
}

impl RenderCacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity() {
        assert_eq!(RenderCacheConfig::default().capacity, 512);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = RenderCacheConfig { capacity: 0 };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }
}
