//! Configuration types for the graph engine.
//!
//! - [`NamespaceCacheConfig`]: namespace definition caching
//! - [`DispatchConfig`]: recursion bound, fan-out and deadlines
//! - [`DatastoreConfig`]: revision fuzzing, GC window and simulated latency

mod cache;
mod datastore;
mod dispatch;

pub use cache::NamespaceCacheConfig;
pub use datastore::DatastoreConfig;
pub use dispatch::DispatchConfig;
