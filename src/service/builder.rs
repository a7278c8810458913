//! Service builder with typestate pattern.

use std::sync::Arc;

use super::PermissionsService;
use crate::config::{DispatchConfig, NamespaceCacheConfig};
use crate::datastore::Datastore;

/// Marker type: datastore not yet provided.
pub struct NoDatastore;

/// Builder for [`PermissionsService`].
///
/// Uses the typestate pattern so a service cannot be built without a
/// datastore.
///
/// ## Required Configuration
///
/// - `datastore()`: where tuples and namespace definitions are read from
///
/// ## Optional Configuration
///
/// - `cache_config()`: namespace cache behavior
/// - `dispatch_config()`: depth bound, concurrency and deadline
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use inferadb_graph::datastore::MemoryDatastore;
/// use inferadb_graph::service::PermissionsService;
/// use inferadb_graph::{DispatchConfig, NamespaceCacheConfig};
///
/// let service = PermissionsService::builder()
///     .datastore(Arc::new(MemoryDatastore::new()))
///     .cache_config(NamespaceCacheConfig::disabled())
///     .dispatch_config(
///         DispatchConfig::builder()
///             .timeout(Duration::from_secs(2))
///             .build(),
///     )
///     .build();
/// assert!(!service.namespaces().config().enabled);
/// ```
pub struct PermissionsServiceBuilder<D> {
    datastore: D,
    cache_config: NamespaceCacheConfig,
    dispatch_config: DispatchConfig,
}

impl PermissionsServiceBuilder<NoDatastore> {
    /// Creates a new service builder.
    pub fn new() -> Self {
        Self {
            datastore: NoDatastore,
            cache_config: NamespaceCacheConfig::default(),
            dispatch_config: DispatchConfig::default(),
        }
    }

    /// Sets the datastore (required).
    #[must_use]
    pub fn datastore(
        self,
        datastore: Arc<dyn Datastore>,
    ) -> PermissionsServiceBuilder<Arc<dyn Datastore>> {
        PermissionsServiceBuilder {
            datastore,
            cache_config: self.cache_config,
            dispatch_config: self.dispatch_config,
        }
    }
}

impl Default for PermissionsServiceBuilder<NoDatastore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> PermissionsServiceBuilder<D> {
    /// Sets the namespace cache configuration.
    ///
    /// Default: enabled, 5 second TTL, 1024 entries.
    #[must_use]
    pub fn cache_config(mut self, config: NamespaceCacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Sets the dispatch configuration.
    ///
    /// Default: depth 50, 50 concurrent branches, no deadline.
    #[must_use]
    pub fn dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatch_config = config;
        self
    }
}

impl PermissionsServiceBuilder<Arc<dyn Datastore>> {
    /// Builds the service.
    pub fn build(self) -> PermissionsService {
        PermissionsService::new(self.datastore, self.cache_config, self.dispatch_config)
    }
}
