//! Cache mirror configuration.

use std::path::PathBuf;
use std::time::Duration;

use servetrack_core::defaults;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory for the file-backed store.
    pub dir: PathBuf,
    /// Number of most recent serve attempts mirrored.
    pub window: u32,
    /// Leading records that may keep their image.
    pub image_window: usize,
    /// Serialized batch size above which every image is dropped.
    pub max_bytes: usize,
    /// Quiet period after a change before the mirror resyncs.
    pub resync_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::CACHE_DIR),
            window: defaults::CACHE_WINDOW,
            image_window: defaults::IMAGE_WINDOW,
            max_bytes: defaults::CACHE_MAX_BYTES,
            resync_delay: Duration::from_millis(defaults::CACHE_RESYNC_DELAY_MS),
        }
    }
}

impl CacheConfig {
    /// Create from `SERVETRACK_CACHE_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            dir: std::env::var(defaults::ENV_CACHE_DIR)
                .map(PathBuf::from)
                .unwrap_or(base.dir),
            window: std::env::var(defaults::ENV_CACHE_WINDOW)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.window),
            image_window: base.image_window,
            max_bytes: std::env::var(defaults::ENV_CACHE_MAX_BYTES)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.max_bytes),
            resync_delay: std::env::var(defaults::ENV_CACHE_RESYNC_DELAY_MS)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(base.resync_delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.window, 100);
        assert_eq!(config.image_window, 20);
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.resync_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_from_env_ignores_garbage() {
        std::env::set_var(defaults::ENV_CACHE_WINDOW, "not-a-number");
        std::env::set_var(defaults::ENV_CACHE_MAX_BYTES, "1024");
        let config = CacheConfig::from_env();
        assert_eq!(config.window, defaults::CACHE_WINDOW);
        assert_eq!(config.max_bytes, 1024);
        std::env::remove_var(defaults::ENV_CACHE_WINDOW);
        std::env::remove_var(defaults::ENV_CACHE_MAX_BYTES);
    }
}
