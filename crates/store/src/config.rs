//! Persistence and autosave settings.

use std::path::PathBuf;
use std::time::Duration;

/// Default coalescing window for autosave writes.
pub const DEFAULT_AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Settings for the document store and autosave queue.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the local cache.
    pub cache_dir: PathBuf,

    /// Whether the remote document store is consulted at all.
    pub remote_enabled: bool,

    /// How long a mutation waits for further mutations before it is written.
    pub autosave_debounce: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".deck"),
            remote_enabled: false,
            autosave_debounce: DEFAULT_AUTOSAVE_DEBOUNCE,
        }
    }
}

impl StoreConfig {
    /// Create a config rooted at the given cache directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Set whether the remote store is enabled.
    pub fn with_remote_enabled(mut self, enabled: bool) -> Self {
        self.remote_enabled = enabled;
        self
    }

    /// Set the autosave coalescing window.
    pub fn with_autosave_debounce(mut self, window: Duration) -> Self {
        self.autosave_debounce = window;
        self
    }
}
