//! Namespace cache configuration.

use std::time::Duration;

/// Configuration for the caching namespace manager.
///
/// Namespace definitions change rarely, so they are cached by name for a
/// fixed TTL. There is no push invalidation: a schema change becomes visible
/// to a process at most `ttl` after it was written.
///
/// ## Example
///
/// ```rust
/// use inferadb_graph::NamespaceCacheConfig;
/// use std::time::Duration;
///
/// let config = NamespaceCacheConfig::builder()
///     .ttl(Duration::from_secs(1))
///     .max_entries(256)
///     .build();
///
/// // Every lookup reads through to the datastore
/// let uncached = NamespaceCacheConfig::disabled();
/// assert!(!uncached.enabled);
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct NamespaceCacheConfig {
    /// Whether caching is enabled.
    #[builder(default = true)]
    pub enabled: bool,

    /// Time-to-live for cached definitions.
    #[builder(default = Duration::from_secs(5))]
    pub ttl: Duration,

    /// Maximum number of cached namespaces.
    ///
    /// When full, expired entries are purged; if none have expired the new
    /// definition is served without being cached.
    #[builder(default = 1024)]
    pub max_entries: usize,
}

impl Default for NamespaceCacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl NamespaceCacheConfig {
    /// Creates a configuration with caching turned off.
    pub fn disabled() -> Self {
        Self::builder().enabled(false).build()
    }
}
