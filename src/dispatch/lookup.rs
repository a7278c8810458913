//! LookupResources: reverse search from a subject, confirmed by check.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::local::Inner;
use super::{LookupRequest, RequestStats};
use crate::datastore::TupleFilter;
use crate::types::{NamespaceDefinition, ObjectAndRelation, SubjectRef};
use crate::Error;

/// A stream of resource IDs produced by a background task.
///
/// Yields `Ok(id)` for each resource the subject can reach, at most once per
/// ID, and stops after the first `Err`. A producer that dies without
/// finishing surfaces as `Cancelled` or `Internal` rather than a short
/// stream. Dropping the stream aborts the producer and everything it has in
/// flight.
pub struct LookupStream {
    receiver: mpsc::Receiver<Result<String, Error>>,
    task: JoinHandle<()>,
    done: bool,
}

impl LookupStream {
    pub(super) fn spawn(inner: Arc<Inner>, request: LookupRequest) -> Self {
        let (sender, receiver) = mpsc::channel(inner.config.lookup_buffer.max(1));
        let task = tokio::spawn(async move {
            let producer = Producer {
                inner: &inner,
                request: &request,
                sender: &sender,
            };
            if let Err(err) = producer.run().await {
                tracing::debug!(error = %err, "lookup aborted");
                let _ = sender.send(Err(err)).await;
            }
        });
        Self {
            receiver,
            task,
            done: false,
        }
    }

    /// Drains the stream into a set, failing on the first error.
    pub async fn collect_ids(mut self) -> Result<HashSet<String>, Error> {
        let mut ids = HashSet::new();
        while let Some(id) = self.next().await {
            ids.insert(id?);
        }
        Ok(ids)
    }
}

impl Stream for LookupStream {
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }
        if let Some(item) = ready!(this.receiver.poll_recv(cx)) {
            return Poll::Ready(Some(item));
        }

        // Channel closed: the producer either returned or died.
        let outcome = ready!(Pin::new(&mut this.task).poll(cx));
        this.done = true;
        Poll::Ready(outcome.err().map(|err| Err(Error::from(err))))
    }
}

impl Drop for LookupStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for LookupStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupStream")
            .field("finished", &self.task.is_finished())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Reverse edges of the schema, built once per lookup.
#[derive(Debug, Default)]
struct ReverseIndex {
    /// `(type, relation)` pairs whose rewrite reads stored tuples.
    direct: HashSet<(String, String)>,
    /// `(type, relation)` to the relations on the same type computed from it.
    computed: HashMap<(String, String), Vec<String>>,
    /// Computed relation name to the `(type, tupleset, relation)` arrows
    /// that evaluate it on the objects a tupleset points at.
    arrows: HashMap<String, Vec<(String, String, String)>>,
}

impl ReverseIndex {
    fn build(namespaces: &[NamespaceDefinition]) -> Self {
        let mut index = ReverseIndex::default();
        for namespace in namespaces {
            for relation in &namespace.relations {
                let key = (namespace.name.clone(), relation.name.clone());
                if relation.rewrite.includes_this() {
                    index.direct.insert(key);
                }
                for source in &namespace.relations {
                    if relation.rewrite.computes_from(&source.name) {
                        index
                            .computed
                            .entry((namespace.name.clone(), source.name.clone()))
                            .or_default()
                            .push(relation.name.clone());
                    }
                }
                for (tupleset, computed) in relation.rewrite.arrows() {
                    index.arrows.entry(computed.to_owned()).or_default().push((
                        namespace.name.clone(),
                        tupleset.to_owned(),
                        relation.name.clone(),
                    ));
                }
            }
        }
        index
    }

    fn is_direct(&self, onr: &ObjectAndRelation) -> bool {
        self.direct
            .contains(&(onr.object.object_type.clone(), onr.relation.clone()))
    }
}

struct Producer<'a> {
    inner: &'a Inner,
    request: &'a LookupRequest,
    sender: &'a mpsc::Sender<Result<String, Error>>,
}

impl Producer<'_> {
    /// Walks outward from the subject one level at a time. Returns early
    /// without error once the receiver is gone.
    ///
    /// The walk itself is unbounded; `seen` makes it finite. Depth is
    /// enforced by the check confirming each candidate, so a lookup fails
    /// with `MaxDepthExceeded` exactly when checking one of its candidates
    /// would.
    async fn run(&self) -> Result<(), Error> {
        let inner = self.inner;
        let request = self.request;
        let limit = inner.config.concurrency_limit.max(1);

        let namespaces = inner.datastore.list_namespaces(request.revision).await?;
        let index = ReverseIndex::build(&namespaces);

        let mut seen: HashSet<SubjectRef> = HashSet::new();
        let mut emitted: HashSet<String> = HashSet::new();
        let mut frontier = vec![request.subject.clone()];
        seen.insert(request.subject.clone());

        // A userset subject is trivially a member of itself.
        if let Some(onr) = request.subject.as_userset()
            && self.is_candidate(&onr)
        {
            emitted.insert(onr.object.object_id.clone());
            if self.sender.send(Ok(onr.object.object_id)).await.is_err() {
                return Ok(());
            }
        }

        let mut level: u32 = 0;
        while !frontier.is_empty() {
            level += 1;

            let lookups: Vec<BoxFuture<'_, Result<Vec<ObjectAndRelation>, Error>>> = frontier
                .iter()
                .map(|subject| self.reachable_from(subject, &index).boxed())
                .collect();
            let found: Vec<Vec<ObjectAndRelation>> = futures::stream::iter(lookups)
                .buffer_unordered(limit)
                .try_collect()
                .await?;

            let mut next = Vec::new();
            let mut candidates = Vec::new();
            for onr in found.into_iter().flatten() {
                let subject = SubjectRef::from(onr.clone());
                if !seen.insert(subject.clone()) {
                    continue;
                }
                if self.is_candidate(&onr) && !emitted.contains(&onr.object.object_id) {
                    candidates.push(onr);
                }
                next.push(subject);
            }

            let checks: Vec<BoxFuture<'_, Result<Option<String>, Error>>> = candidates
                .into_iter()
                .map(|candidate| self.confirm(candidate).boxed())
                .collect();
            let mut confirmed = futures::stream::iter(checks).buffer_unordered(limit);
            while let Some(result) = confirmed.next().await {
                if let Some(id) = result?
                    && emitted.insert(id.clone())
                    && self.sender.send(Ok(id)).await.is_err()
                {
                    return Ok(());
                }
            }

            frontier = next;
        }

        tracing::debug!(
            resource_type = %request.resource_type,
            permission = %request.permission,
            subject = %request.subject,
            found = emitted.len(),
            levels = level,
            "lookup complete"
        );
        Ok(())
    }

    fn is_candidate(&self, onr: &ObjectAndRelation) -> bool {
        onr.object.object_type == self.request.resource_type
            && onr.relation == self.request.permission
    }

    /// Usersets one step away from `subject` in the reverse direction.
    async fn reachable_from(
        &self,
        subject: &SubjectRef,
        index: &ReverseIndex,
    ) -> Result<Vec<ObjectAndRelation>, Error> {
        let revision = self.request.revision;
        let mut found: Vec<ObjectAndRelation> = self
            .inner
            .datastore
            .query_tuples(&TupleFilter::for_subject(subject), revision)
            .await?
            .iter()
            .map(|tuple| tuple.userset())
            .filter(|onr| index.is_direct(onr))
            .collect();

        let Some(relation) = &subject.relation else {
            return Ok(found);
        };
        let object = &subject.object;

        if let Some(targets) = index
            .computed
            .get(&(object.object_type.clone(), relation.clone()))
        {
            found.extend(targets.iter().map(|target| object.with_relation(target.clone())));
        }

        if let Some(arrows) = index.arrows.get(relation) {
            for (resource_type, tupleset, target) in arrows {
                let filter = TupleFilter::new()
                    .with_object_type(resource_type.clone())
                    .with_relation(tupleset.clone())
                    .with_subject_object(object.object_type.clone(), object.object_id.clone());
                let tuples = self.inner.datastore.query_tuples(&filter, revision).await?;
                found.extend(
                    tuples
                        .into_iter()
                        .map(|tuple| tuple.resource.with_relation(target.clone())),
                );
            }
        }

        Ok(found)
    }

    /// Runs a full check on a candidate, returning its ID if the subject is
    /// a member.
    async fn confirm(&self, candidate: ObjectAndRelation) -> Result<Option<String>, Error> {
        let inner = self.inner;
        let stats = RequestStats::new(inner.config.max_depth);
        let membership = inner
            .check_userset(
                candidate.clone(),
                &self.request.subject,
                self.request.revision,
                &stats,
                inner.config.max_depth,
            )
            .await?;
        Ok(membership.is_member().then(|| candidate.object.object_id))
    }
}
