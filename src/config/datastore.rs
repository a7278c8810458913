//! Datastore configuration.

use std::time::Duration;

/// Configuration for the in-memory datastore.
///
/// ## Example
///
/// ```rust
/// use inferadb_graph::DatastoreConfig;
/// use std::time::Duration;
///
/// let config = DatastoreConfig::builder()
///     .revision_fuzzing(Duration::from_secs(1))
///     .gc_window(Duration::from_secs(3600))
///     .build();
/// assert!(!config.gc_disabled());
///
/// assert!(DatastoreConfig::default().gc_disabled());
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct DatastoreConfig {
    /// How far behind the head the optimized revision may lag.
    ///
    /// Zero makes the optimized revision equal the head.
    #[builder(default = Duration::ZERO)]
    pub revision_fuzzing: Duration,

    /// How long superseded data stays readable.
    ///
    /// Revisions older than `now - gc_window` are rejected with
    /// `RevisionTooOld`. `Duration::MAX` disables garbage collection.
    #[builder(default = Duration::MAX)]
    pub gc_window: Duration,

    /// Artificial delay added to every read.
    #[builder(default = Duration::ZERO)]
    pub simulated_latency: Duration,

    /// Period of the background garbage collector, if one is started.
    pub gc_interval: Option<Duration>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DatastoreConfig {
    /// Returns `true` if garbage collection is disabled.
    #[inline]
    pub fn gc_disabled(&self) -> bool {
        self.gc_window == Duration::MAX
    }
}
