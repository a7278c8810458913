//! TTL cache of namespace definitions.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::config::NamespaceCacheConfig;
use crate::datastore::Datastore;
use crate::types::{NamespaceDefinition, Relation, Revision};
use crate::Error;

#[derive(Debug)]
struct CachedNamespace {
    definition: Arc<NamespaceDefinition>,
    expires_at: Instant,
}

/// One cache slot per name. The first caller to find the slot empty performs
/// the datastore read; concurrent callers await the same cell.
#[derive(Debug, Default)]
struct Slot {
    cell: OnceCell<CachedNamespace>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.cell.get().is_some_and(|entry| entry.expires_at <= now)
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamespaceCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that read the datastore.
    pub misses: u64,
    /// Slots currently held.
    pub entries: usize,
}

/// Reads namespace definitions through a per-name TTL cache.
///
/// Constructed once and shared by handle. The map is sharded, so unrelated
/// names never contend; concurrent misses on the same name share a single
/// datastore read. Failed reads (including `NotFound`) are never cached.
///
/// Entries are keyed by name only: within the TTL, a definition read at one
/// revision is served to requests at any revision.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use inferadb_graph::datastore::{Datastore, MemoryDatastore};
/// use inferadb_graph::namespace::CachingNamespaceManager;
/// use inferadb_graph::{NamespaceCacheConfig, NamespaceDefinition, Relation};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryDatastore::new());
/// let revision = store
///     .write_namespace(NamespaceDefinition::new("user").with_relation(Relation::direct("self")))
///     .await?;
///
/// let manager = CachingNamespaceManager::new(store, NamespaceCacheConfig::default());
/// let user = manager.read_namespace("user", revision).await?;
/// assert_eq!(user.name, "user");
///
/// manager.read_namespace("user", revision).await?;
/// assert_eq!(manager.stats().hits, 1);
/// # Ok::<(), inferadb_graph::Error>(())
/// # });
/// ```
pub struct CachingNamespaceManager {
    datastore: Arc<dyn Datastore>,
    config: NamespaceCacheConfig,
    cache: DashMap<String, Arc<Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingNamespaceManager {
    /// Creates a manager reading from `datastore`.
    pub fn new(datastore: Arc<dyn Datastore>, config: NamespaceCacheConfig) -> Self {
        Self {
            datastore,
            config,
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &NamespaceCacheConfig {
        &self.config
    }

    /// Returns the namespace definition named `name`.
    ///
    /// On a miss or an expired entry the definition is read at `revision`.
    /// `NotFound` if it does not exist there.
    pub async fn read_namespace(
        &self,
        name: &str,
        revision: Revision,
    ) -> Result<Arc<NamespaceDefinition>, Error> {
        if !self.config.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return self.fetch(name, revision).await;
        }

        loop {
            let now = Instant::now();
            let Some(slot) = self.slot(name, now) else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return self.fetch(name, revision).await;
            };

            if slot.is_expired(now) {
                tracing::trace!(namespace = name, "cached namespace expired");
                self.cache.remove_if(name, |_, current| Arc::ptr_eq(current, &slot));
                continue;
            }

            let loaded = AtomicBool::new(false);
            let result = slot
                .cell
                .get_or_try_init(|| async {
                    loaded.store(true, Ordering::Relaxed);
                    let definition = self.fetch(name, revision).await?;
                    Ok::<_, Error>(CachedNamespace {
                        definition,
                        expires_at: Instant::now() + self.config.ttl,
                    })
                })
                .await;

            match result {
                Ok(entry) => {
                    if loaded.load(Ordering::Relaxed) {
                        self.misses.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                    }
                    return Ok(Arc::clone(&entry.definition));
                }
                Err(err) => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    self.cache.remove_if(name, |_, current| {
                        Arc::ptr_eq(current, &slot) && current.cell.get().is_none()
                    });
                    return Err(err);
                }
            }
        }
    }

    /// Returns the relation `relation` of namespace `name`.
    ///
    /// `NotFound` if the namespace is absent, `SchemaViolation` if it does not
    /// define the relation.
    pub async fn relation(
        &self,
        name: &str,
        relation: &str,
        revision: Revision,
    ) -> Result<Relation, Error> {
        let definition = self.read_namespace(name, revision).await?;
        definition.relation(relation).cloned().ok_or_else(|| {
            Error::schema_violation(format!(
                "relation `{}` not found in namespace `{}`",
                relation, name
            ))
        })
    }

    /// Evicts one name.
    pub fn invalidate(&self, name: &str) {
        self.cache.remove(name);
    }

    /// Evicts everything.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Returns the cache counters.
    pub fn stats(&self) -> NamespaceCacheStats {
        NamespaceCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }

    /// Returns the slot for `name`, creating it if there is room.
    ///
    /// `None` means the cache is full of live entries and the caller should
    /// read through.
    fn slot(&self, name: &str, now: Instant) -> Option<Arc<Slot>> {
        if let Some(slot) = self.cache.get(name) {
            return Some(Arc::clone(slot.value()));
        }
        if self.cache.len() >= self.config.max_entries {
            self.cache.retain(|_, slot| !slot.is_expired(now));
            if self.cache.len() >= self.config.max_entries {
                tracing::debug!(
                    namespace = name,
                    max_entries = self.config.max_entries,
                    "namespace cache full, reading through"
                );
                return None;
            }
        }
        Some(Arc::clone(
            self.cache.entry(name.to_owned()).or_default().value(),
        ))
    }

    async fn fetch(
        &self,
        name: &str,
        revision: Revision,
    ) -> Result<Arc<NamespaceDefinition>, Error> {
        tracing::debug!(namespace = name, revision = %revision, "loading namespace");
        let (definition, _) = self.datastore.read_namespace(name, revision).await?;
        Ok(Arc::new(definition))
    }
}

impl fmt::Debug for CachingNamespaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingNamespaceManager")
            .field("config", &self.config)
            .field("entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}
