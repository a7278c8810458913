//! Dispatcher configuration.

use std::time::Duration;

/// Configuration for graph evaluation.
///
/// ## Default Values
///
/// - `max_depth`: 50
/// - `concurrency_limit`: 50
/// - `lookup_buffer`: 128
/// - `timeout`: none
///
/// ## Example
///
/// ```rust
/// use inferadb_graph::DispatchConfig;
/// use std::time::Duration;
///
/// let config = DispatchConfig::builder()
///     .max_depth(25)
///     .timeout(Duration::from_secs(2))
///     .build();
/// assert_eq!(config.max_depth, 25);
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct DispatchConfig {
    /// Maximum recursion depth for a single request.
    ///
    /// Running out of depth fails the request with `MaxDepthExceeded`.
    #[builder(default = 50)]
    pub max_depth: u32,

    /// Maximum number of tuple-driven sub-dispatches polled at once for a
    /// single rewrite node.
    #[builder(default = 50)]
    pub concurrency_limit: usize,

    /// Capacity of the channel between the lookup producer and its stream.
    #[builder(default = 128)]
    pub lookup_buffer: usize,

    /// Deadline applied by the service facade to check and expand requests.
    pub timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
