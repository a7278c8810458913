//! Check evaluation.

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};

use super::local::Inner;
use super::{Membership, RequestStats};
use crate::datastore::TupleFilter;
use crate::types::{ObjectAndRelation, Revision, Rewrite, SubjectRef};
use crate::{Error, ErrorKind};

impl Inner {
    /// Decides whether `subject` is a member of `userset`, with `depth`
    /// evaluations left before giving up.
    pub(super) fn check_userset<'a>(
        &'a self,
        userset: ObjectAndRelation,
        subject: &'a SubjectRef,
        revision: Revision,
        stats: &'a RequestStats,
        depth: u32,
    ) -> BoxFuture<'a, Result<Membership, Error>> {
        async move {
            if depth == 0 {
                return Err(Error::max_depth_exceeded());
            }
            stats.record(depth);

            if subject.is_userset_of(&userset) {
                return Ok(Membership::Member);
            }

            let namespace = match self
                .namespaces
                .read_namespace(&userset.object.object_type, revision)
                .await
            {
                Ok(namespace) => namespace,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::trace!(userset = %userset, "namespace missing, not a member");
                    return Ok(Membership::NotMember);
                }
                Err(err) => return Err(err),
            };
            let relation = namespace.relation(&userset.relation).ok_or_else(|| {
                Error::schema_violation(format!(
                    "relation `{}` not found under definition `{}`",
                    userset.relation, userset.object.object_type
                ))
            })?;

            self.check_rewrite(&relation.rewrite, &userset, subject, revision, stats, depth)
                .await
        }
        .boxed()
    }

    fn check_rewrite<'a>(
        &'a self,
        rewrite: &'a Rewrite,
        userset: &'a ObjectAndRelation,
        subject: &'a SubjectRef,
        revision: Revision,
        stats: &'a RequestStats,
        depth: u32,
    ) -> BoxFuture<'a, Result<Membership, Error>> {
        async move {
            match rewrite {
                Rewrite::This => self.check_direct(userset, subject, revision, stats, depth).await,

                Rewrite::ComputedUserset(relation) => {
                    let computed = userset.object.with_relation(relation.clone());
                    self.check_userset(computed, subject, revision, stats, depth - 1)
                        .await
                }

                Rewrite::TupleToUserset { tupleset, computed } => {
                    let filter =
                        TupleFilter::for_userset(&userset.object.with_relation(tupleset.clone()));
                    let tuples = self.datastore.query_tuples(&filter, revision).await?;
                    let mut branches = Vec::with_capacity(tuples.len());
                    for tuple in tuples {
                        let target = tuple.subject.object.with_relation(computed.clone());
                        branches
                            .push(self.check_userset(target, subject, revision, stats, depth - 1));
                    }
                    any_member(branches, self.config.concurrency_limit).await
                }

                Rewrite::Union(children) => {
                    let branches =
                        self.child_checks(children, userset, subject, revision, stats, depth);
                    any_member(branches, children.len()).await
                }

                Rewrite::Intersection(children) => {
                    let branches =
                        self.child_checks(children, userset, subject, revision, stats, depth);
                    all_members(branches, children.len()).await
                }

                Rewrite::Exclusion { base, subtract } => {
                    let base = self.check_rewrite(base, userset, subject, revision, stats, depth);
                    let subtract =
                        self.check_rewrite(subtract, userset, subject, revision, stats, depth);
                    exclude(base, subtract).await
                }
            }
        }
        .boxed()
    }

    /// Tuples stored directly under `userset`: an exact subject match, or a
    /// userset subject the query subject belongs to.
    async fn check_direct(
        &self,
        userset: &ObjectAndRelation,
        subject: &SubjectRef,
        revision: Revision,
        stats: &RequestStats,
        depth: u32,
    ) -> Result<Membership, Error> {
        let tuples = self
            .datastore
            .query_tuples(&TupleFilter::for_userset(userset), revision)
            .await?;

        if tuples.iter().any(|tuple| tuple.subject == *subject) {
            return Ok(Membership::Member);
        }

        let mut branches = Vec::new();
        for nested in tuples.iter().filter_map(|tuple| tuple.subject.as_userset()) {
            branches.push(self.check_userset(nested, subject, revision, stats, depth - 1));
        }
        any_member(branches, self.config.concurrency_limit).await
    }

    fn child_checks<'a>(
        &'a self,
        children: &'a [Rewrite],
        userset: &'a ObjectAndRelation,
        subject: &'a SubjectRef,
        revision: Revision,
        stats: &'a RequestStats,
        depth: u32,
    ) -> Vec<BoxFuture<'a, Result<Membership, Error>>> {
        let mut branches = Vec::with_capacity(children.len());
        for child in children {
            branches.push(self.check_rewrite(child, userset, subject, revision, stats, depth));
        }
        branches
    }
}

/// Member as soon as any branch is. Returning early drops the rest.
async fn any_member(
    branches: Vec<BoxFuture<'_, Result<Membership, Error>>>,
    limit: usize,
) -> Result<Membership, Error> {
    let mut results = futures::stream::iter(branches).buffer_unordered(limit.max(1));
    while let Some(result) = results.next().await {
        if result?.is_member() {
            return Ok(Membership::Member);
        }
    }
    Ok(Membership::NotMember)
}

/// Not a member as soon as any branch is not.
async fn all_members(
    branches: Vec<BoxFuture<'_, Result<Membership, Error>>>,
    limit: usize,
) -> Result<Membership, Error> {
    let mut results = futures::stream::iter(branches).buffer_unordered(limit.max(1));
    while let Some(result) = results.next().await {
        if !result?.is_member() {
            return Ok(Membership::NotMember);
        }
    }
    Ok(Membership::Member)
}

/// Member of `base` and not of `subtract`, decided as soon as either side
/// settles it.
async fn exclude(
    mut base: BoxFuture<'_, Result<Membership, Error>>,
    mut subtract: BoxFuture<'_, Result<Membership, Error>>,
) -> Result<Membership, Error> {
    let mut base_done = false;
    let mut subtract_done = false;
    loop {
        tokio::select! {
            result = &mut base, if !base_done => {
                if !result?.is_member() {
                    return Ok(Membership::NotMember);
                }
                base_done = true;
            }
            result = &mut subtract, if !subtract_done => {
                if result?.is_member() {
                    return Ok(Membership::NotMember);
                }
                subtract_done = true;
            }
        }
        if base_done && subtract_done {
            return Ok(Membership::Member);
        }
    }
}
