//! In-memory revisioned datastore.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::{Datastore, TupleFilter, TupleOperation, TupleUpdate};
use crate::config::DatastoreConfig;
use crate::types::{NamespaceDefinition, RelationTuple, Revision};
use crate::Error;

/// The revision span during which a value is visible: `[created, deleted)`.
#[derive(Debug, Clone, Copy)]
struct Span {
    created: Revision,
    deleted: Option<Revision>,
}

impl Span {
    fn new(created: Revision) -> Self {
        Self {
            created,
            deleted: None,
        }
    }

    fn visible_at(&self, revision: Revision) -> bool {
        self.created <= revision && self.deleted.is_none_or(|d| d > revision)
    }

    fn is_live(&self) -> bool {
        self.deleted.is_none()
    }
}

#[derive(Debug, Default)]
struct State {
    tuples: BTreeMap<RelationTuple, Vec<Span>>,
    namespaces: HashMap<String, Vec<(Arc<NamespaceDefinition>, Span)>>,
    last_revision: Revision,
    /// Highest head ever handed out. Writes must land after it even if the
    /// clock goes backwards.
    reported_head: Revision,
}

impl State {
    /// Allocates a revision strictly after every previous write and every
    /// head already reported.
    fn next_revision(&mut self, now: Revision) -> Revision {
        let revision = now
            .max(self.last_revision.next())
            .max(self.reported_head.next());
        self.last_revision = revision;
        revision
    }

    /// The head at `now`, never lower than one reported before.
    fn report_head(&mut self, now: Revision) -> Revision {
        let head = now.max(self.last_revision).max(self.reported_head);
        self.reported_head = head;
        head
    }

    fn is_live(&self, tuple: &RelationTuple) -> bool {
        self.tuples
            .get(tuple)
            .is_some_and(|spans| spans.iter().any(Span::is_live))
    }
}

/// Counts of what a garbage collection pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Deleted tuple versions dropped.
    pub tuples_removed: usize,
    /// Superseded namespace versions dropped.
    pub namespaces_removed: usize,
}

/// A handle that stops a background garbage collector.
///
/// Dropping every clone of the handle stops the collector as well.
#[derive(Debug, Clone)]
pub struct GcShutdownHandle {
    sender: Arc<tokio::sync::watch::Sender<bool>>,
}

impl GcShutdownHandle {
    fn new() -> (Self, tokio::sync::watch::Receiver<bool>) {
        let (sender, receiver) = tokio::sync::watch::channel(false);
        (
            Self {
                sender: Arc::new(sender),
            },
            receiver,
        )
    }

    /// Stops the collector after its current pass.
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
    }

    /// Returns `true` if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }
}

/// A [`Datastore`] held entirely in memory.
///
/// Revisions are wall-clock nanoseconds, so the GC window and the fuzzing
/// window are real durations. A write always lands after the previous write
/// and after every head already reported, even when the clock stalls or
/// steps back. Superseded data stays readable until garbage collected.
///
/// ## Example
///
/// ```rust
/// use inferadb_graph::datastore::{Datastore, MemoryDatastore, TupleFilter, TupleUpdate};
///
/// # tokio_test::block_on(async {
/// let store = MemoryDatastore::new();
/// let revision = store
///     .write_tuples(vec![TupleUpdate::create("doc:1#viewer@user:alice".parse()?)])
///     .await?;
///
/// let tuples = store.query_tuples(&TupleFilter::new(), revision).await?;
/// assert_eq!(tuples.len(), 1);
/// # Ok::<(), inferadb_graph::Error>(())
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    config: DatastoreConfig,
    state: RwLock<State>,
}

impl MemoryDatastore {
    /// Creates a datastore with no fuzzing, no latency and GC disabled.
    pub fn new() -> Self {
        Self::with_config(DatastoreConfig::default())
    }

    /// Creates a datastore with the given configuration.
    pub fn with_config(config: DatastoreConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    /// The oldest readable revision, or zero when GC is disabled.
    fn gc_horizon(&self) -> Revision {
        if self.config.gc_disabled() {
            return Revision::ZERO;
        }
        now_revision().saturating_sub(duration_nanos(self.config.gc_window))
    }

    fn current_head(&self) -> Revision {
        self.state.write().report_head(now_revision())
    }

    async fn simulate_latency(&self) {
        if !self.config.simulated_latency.is_zero() {
            tokio::time::sleep(self.config.simulated_latency).await;
        }
    }

    /// Drops tuple and namespace versions that are no longer visible at any
    /// revision inside the GC window.
    pub fn collect_garbage(&self) -> GcStats {
        let horizon = self.gc_horizon();
        let mut stats = GcStats::default();
        if horizon == Revision::ZERO {
            return stats;
        }

        let mut state = self.state.write();
        state.tuples.retain(|_, spans| {
            let before = spans.len();
            spans.retain(|span| span.deleted.is_none_or(|d| d > horizon));
            stats.tuples_removed += before - spans.len();
            !spans.is_empty()
        });
        state.namespaces.retain(|_, versions| {
            let before = versions.len();
            versions.retain(|(_, span)| span.deleted.is_none_or(|d| d > horizon));
            stats.namespaces_removed += before - versions.len();
            !versions.is_empty()
        });
        drop(state);

        tracing::debug!(
            horizon = %horizon,
            tuples_removed = stats.tuples_removed,
            namespaces_removed = stats.namespaces_removed,
            "garbage collection pass complete"
        );
        stats
    }

    /// Starts a background task running [`collect_garbage`](Self::collect_garbage)
    /// every `gc_interval`.
    ///
    /// Returns `None` when no interval is configured or GC is disabled.
    /// Must be called from within a Tokio runtime.
    pub fn start_garbage_collector(self: &Arc<Self>) -> Option<GcShutdownHandle> {
        let interval = self.config.gc_interval?;
        if self.config.gc_disabled() || interval.is_zero() {
            return None;
        }

        let (handle, mut shutdown) = GcShutdownHandle::new();
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
                match store.upgrade() {
                    Some(store) => {
                        store.collect_garbage();
                    }
                    None => break,
                }
            }
            tracing::debug!("garbage collector stopped");
        });
        Some(handle)
    }
}

#[async_trait::async_trait]
impl Datastore for MemoryDatastore {
    async fn head_revision(&self) -> Result<Revision, Error> {
        Ok(self.current_head())
    }

    async fn optimized_revision(&self) -> Result<Revision, Error> {
        let head = self.current_head();
        let window = duration_nanos(self.config.revision_fuzzing);
        if window == 0 {
            return Ok(head);
        }
        let lag = fastrand::u64(0..=window);
        Ok(head.saturating_sub(lag).max(self.gc_horizon()))
    }

    async fn check_revision(&self, revision: Revision) -> Result<(), Error> {
        let horizon = self.gc_horizon();
        if revision < horizon {
            return Err(Error::revision_too_old(format!(
                "revision {} is older than the garbage collection horizon {}",
                revision, horizon
            )));
        }
        let head = self.current_head();
        if revision > head {
            return Err(Error::invalid_argument(format!(
                "revision {} is newer than the head revision {}",
                revision, head
            )));
        }
        Ok(())
    }

    async fn query_tuples(
        &self,
        filter: &TupleFilter,
        revision: Revision,
    ) -> Result<Vec<RelationTuple>, Error> {
        self.simulate_latency().await;
        let state = self.state.read();
        Ok(state
            .tuples
            .iter()
            .filter(|(tuple, spans)| {
                filter.matches(tuple) && spans.iter().any(|s| s.visible_at(revision))
            })
            .map(|(tuple, _)| tuple.clone())
            .collect())
    }

    async fn read_namespace(
        &self,
        name: &str,
        revision: Revision,
    ) -> Result<(NamespaceDefinition, Revision), Error> {
        self.simulate_latency().await;
        let state = self.state.read();
        state
            .namespaces
            .get(name)
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|(_, span)| span.visible_at(revision))
                    .map(|(definition, span)| (definition.as_ref().clone(), span.created))
            })
            .ok_or_else(|| {
                Error::not_found(format!(
                    "namespace `{}` not found at revision {}",
                    name, revision
                ))
            })
    }

    async fn list_namespaces(&self, revision: Revision) -> Result<Vec<NamespaceDefinition>, Error> {
        self.simulate_latency().await;
        let state = self.state.read();
        let mut definitions: Vec<NamespaceDefinition> = state
            .namespaces
            .values()
            .filter_map(|versions| {
                versions
                    .iter()
                    .find(|(_, span)| span.visible_at(revision))
                    .map(|(definition, _)| definition.as_ref().clone())
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(definitions)
    }

    async fn write_tuples(&self, updates: Vec<TupleUpdate>) -> Result<Revision, Error> {
        let mut state = self.state.write();

        let mut created = HashSet::new();
        for update in &updates {
            if update.operation == TupleOperation::Create
                && (state.is_live(&update.tuple) || !created.insert(&update.tuple))
            {
                return Err(Error::conflict(format!(
                    "relationship `{}` already exists",
                    update.tuple
                )));
            }
        }

        let revision = state.next_revision(now_revision());
        for update in updates {
            let live = state.is_live(&update.tuple);
            match update.operation {
                TupleOperation::Create | TupleOperation::Touch if !live => {
                    state
                        .tuples
                        .entry(update.tuple)
                        .or_default()
                        .push(Span::new(revision));
                }
                TupleOperation::Delete if live => {
                    if let Some(spans) = state.tuples.get_mut(&update.tuple) {
                        for span in spans.iter_mut().filter(|s| s.is_live()) {
                            span.deleted = Some(revision);
                        }
                    }
                }
                _ => {}
            }
        }

        tracing::trace!(revision = %revision, "tuples written");
        Ok(revision)
    }

    async fn write_namespace(&self, definition: NamespaceDefinition) -> Result<Revision, Error> {
        definition.validate()?;

        let mut state = self.state.write();
        let revision = state.next_revision(now_revision());
        let versions = state
            .namespaces
            .entry(definition.name.clone())
            .or_default();
        for (_, span) in versions.iter_mut().filter(|(_, s)| s.is_live()) {
            span.deleted = Some(revision);
        }
        tracing::debug!(namespace = %definition.name, revision = %revision, "namespace written");
        versions.insert(0, (Arc::new(definition), Span::new(revision)));
        Ok(revision)
    }

    async fn delete_namespace(&self, name: &str) -> Result<Revision, Error> {
        let mut state = self.state.write();
        let exists = state
            .namespaces
            .get(name)
            .is_some_and(|versions| versions.iter().any(|(_, s)| s.is_live()));
        if !exists {
            return Err(Error::not_found(format!("namespace `{}` not found", name)));
        }

        let revision = state.next_revision(now_revision());
        if let Some(versions) = state.namespaces.get_mut(name) {
            for (_, span) in versions.iter_mut().filter(|(_, s)| s.is_live()) {
                span.deleted = Some(revision);
            }
        }
        Ok(revision)
    }
}

fn now_revision() -> Revision {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    Revision::new(u64::try_from(nanos).unwrap_or(0))
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
