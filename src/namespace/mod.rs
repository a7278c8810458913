//! Namespace definition lookup.

mod manager;

pub use manager::{CachingNamespaceManager, NamespaceCacheStats};
