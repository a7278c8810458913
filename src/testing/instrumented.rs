//! A datastore wrapper that counts reads and injects failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::datastore::{Datastore, TupleFilter, TupleUpdate};
use crate::types::{NamespaceDefinition, RelationTuple, Revision};
use crate::Error;

/// Wraps a [`Datastore`], counting reads and optionally failing them.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use inferadb_graph::datastore::{Datastore, MemoryDatastore, TupleFilter};
/// use inferadb_graph::testing::InstrumentedDatastore;
/// use inferadb_graph::{Error, Revision};
///
/// # tokio_test::block_on(async {
/// let store = InstrumentedDatastore::new(Arc::new(MemoryDatastore::new()));
/// store.fail_tuple_reads(Error::unavailable("connection reset"));
///
/// let err = store.query_tuples(&TupleFilter::new(), Revision::ZERO).await.unwrap_err();
/// assert!(err.is_retriable());
/// assert_eq!(store.tuple_reads(), 1);
/// # });
/// ```
pub struct InstrumentedDatastore {
    inner: Arc<dyn Datastore>,
    tuple_reads: AtomicU64,
    namespace_reads: AtomicU64,
    tuple_failure: RwLock<Option<Failure>>,
}

struct Failure {
    error: Error,
    persistent: bool,
}

impl InstrumentedDatastore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn Datastore>) -> Self {
        Self {
            inner,
            tuple_reads: AtomicU64::new(0),
            namespace_reads: AtomicU64::new(0),
            tuple_failure: RwLock::new(None),
        }
    }

    /// Fails every tuple read with `error` until cleared.
    pub fn fail_tuple_reads(&self, error: Error) {
        *self.tuple_failure.write() = Some(Failure {
            error,
            persistent: true,
        });
    }

    /// Fails only the next tuple read with `error`.
    pub fn fail_next_tuple_read(&self, error: Error) {
        *self.tuple_failure.write() = Some(Failure {
            error,
            persistent: false,
        });
    }

    /// Clears any injected failure.
    pub fn clear_failure(&self) {
        *self.tuple_failure.write() = None;
    }

    /// Number of tuple queries made.
    pub fn tuple_reads(&self) -> u64 {
        self.tuple_reads.load(Ordering::Relaxed)
    }

    /// Number of namespace reads made (single and list).
    pub fn namespace_reads(&self) -> u64 {
        self.namespace_reads.load(Ordering::Relaxed)
    }

    /// Resets both counters.
    pub fn reset_counts(&self) {
        self.tuple_reads.store(0, Ordering::Relaxed);
        self.namespace_reads.store(0, Ordering::Relaxed);
    }

    fn check_failure(&self) -> Result<(), Error> {
        let mut failure = self.tuple_failure.write();
        let Some(current) = failure.as_ref() else {
            return Ok(());
        };
        if current.persistent {
            let error = &current.error;
            return Err(Error::new(error.kind(), error.message().to_owned()));
        }
        match failure.take() {
            Some(current) => Err(current.error),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Datastore for InstrumentedDatastore {
    async fn head_revision(&self) -> Result<Revision, Error> {
        self.inner.head_revision().await
    }

    async fn optimized_revision(&self) -> Result<Revision, Error> {
        self.inner.optimized_revision().await
    }

    async fn check_revision(&self, revision: Revision) -> Result<(), Error> {
        self.inner.check_revision(revision).await
    }

    async fn query_tuples(
        &self,
        filter: &TupleFilter,
        revision: Revision,
    ) -> Result<Vec<RelationTuple>, Error> {
        self.tuple_reads.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        self.inner.query_tuples(filter, revision).await
    }

    async fn read_namespace(
        &self,
        name: &str,
        revision: Revision,
    ) -> Result<(NamespaceDefinition, Revision), Error> {
        self.namespace_reads.fetch_add(1, Ordering::Relaxed);
        self.inner.read_namespace(name, revision).await
    }

    async fn list_namespaces(&self, revision: Revision) -> Result<Vec<NamespaceDefinition>, Error> {
        self.namespace_reads.fetch_add(1, Ordering::Relaxed);
        self.inner.list_namespaces(revision).await
    }

    async fn write_tuples(&self, updates: Vec<TupleUpdate>) -> Result<Revision, Error> {
        self.inner.write_tuples(updates).await
    }

    async fn write_namespace(&self, definition: NamespaceDefinition) -> Result<Revision, Error> {
        self.inner.write_namespace(definition).await
    }

    async fn delete_namespace(&self, name: &str) -> Result<Revision, Error> {
        self.inner.delete_namespace(name).await
    }
}
