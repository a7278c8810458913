//! Expand evaluation and the subject tree it produces.

use std::collections::BTreeSet;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use super::local::Inner;
use super::{ExpandMode, RequestStats};
use crate::datastore::TupleFilter;
use crate::types::{ObjectAndRelation, Revision, Rewrite, SubjectRef};
use crate::{Error, ErrorKind};

/// Set operation joining the children of an intermediate node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOperation {
    /// Any child.
    Union,
    /// Every child.
    Intersection,
    /// The first child minus the others.
    Exclusion,
}

/// The subject tree behind a userset.
///
/// The shape mirrors the relation's rewrite: leaves hold directly stored
/// subjects, intermediate nodes hold the set operation joining their
/// children.
///
/// ```text
/// Intermediate(document:plan#viewer, Union)
/// ├── Leaf(document:plan#viewer, [user:eng_lead])
/// ├── Leaf(document:plan#editor, [user:product_manager])
/// └── Intermediate(document:plan#viewer, Union)
///     └── Leaf(folder:plans#viewer, [user:cfo])
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandTree {
    /// Subjects stored directly under `expanded`.
    Leaf {
        /// The userset these subjects belong to.
        expanded: ObjectAndRelation,
        /// The stored subjects.
        subjects: Vec<SubjectRef>,
    },
    /// A set operation over child trees.
    Intermediate {
        /// The userset this node expands.
        expanded: ObjectAndRelation,
        /// How the children combine.
        operation: SetOperation,
        /// The operands.
        children: Vec<ExpandTree>,
    },
}

impl ExpandTree {
    /// Returns the userset this node expands.
    pub fn expanded(&self) -> &ObjectAndRelation {
        match self {
            ExpandTree::Leaf { expanded, .. } | ExpandTree::Intermediate { expanded, .. } => {
                expanded
            }
        }
    }

    /// Returns `true` for a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, ExpandTree::Leaf { .. })
    }

    /// Evaluates the set algebra over the leaves.
    ///
    /// Userset subjects count as subjects in their own right; in
    /// [`ExpandMode::Recursive`] their members are included too.
    pub fn subjects(&self) -> BTreeSet<SubjectRef> {
        match self {
            ExpandTree::Leaf { subjects, .. } => subjects.iter().cloned().collect(),
            ExpandTree::Intermediate {
                operation,
                children,
                ..
            } => {
                let mut sets = children.iter().map(ExpandTree::subjects);
                match operation {
                    SetOperation::Union => sets.flatten().collect(),
                    SetOperation::Intersection => match sets.next() {
                        Some(first) => sets.fold(first, |acc, set| &acc & &set),
                        None => BTreeSet::new(),
                    },
                    SetOperation::Exclusion => match sets.next() {
                        Some(first) => sets.fold(first, |acc, set| &acc - &set),
                        None => BTreeSet::new(),
                    },
                }
            }
        }
    }
}

impl Inner {
    pub(super) fn expand_userset<'a>(
        &'a self,
        userset: ObjectAndRelation,
        mode: ExpandMode,
        revision: Revision,
        stats: &'a RequestStats,
        depth: u32,
    ) -> BoxFuture<'a, Result<ExpandTree, Error>> {
        async move {
            if depth == 0 {
                return Err(Error::max_depth_exceeded());
            }
            stats.record(depth);

            let namespace = match self
                .namespaces
                .read_namespace(&userset.object.object_type, revision)
                .await
            {
                Ok(namespace) => namespace,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Ok(ExpandTree::Leaf {
                        expanded: userset,
                        subjects: Vec::new(),
                    });
                }
                Err(err) => return Err(err),
            };
            let relation = namespace.relation(&userset.relation).ok_or_else(|| {
                Error::schema_violation(format!(
                    "relation `{}` not found under definition `{}`",
                    userset.relation, userset.object.object_type
                ))
            })?;

            self.expand_rewrite(&relation.rewrite, &userset, mode, revision, stats, depth)
                .await
        }
        .boxed()
    }

    fn expand_rewrite<'a>(
        &'a self,
        rewrite: &'a Rewrite,
        userset: &'a ObjectAndRelation,
        mode: ExpandMode,
        revision: Revision,
        stats: &'a RequestStats,
        depth: u32,
    ) -> BoxFuture<'a, Result<ExpandTree, Error>> {
        async move {
            let limit = self.config.concurrency_limit.max(1);
            match rewrite {
                Rewrite::This => self.expand_direct(userset, mode, revision, stats, depth).await,

                Rewrite::ComputedUserset(relation) => {
                    let computed = userset.object.with_relation(relation.clone());
                    self.expand_userset(computed, mode, revision, stats, depth - 1)
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
                            .push(self.expand_userset(target, mode, revision, stats, depth - 1));
                    }
                    let children: Vec<ExpandTree> = futures::stream::iter(branches)
                        .buffered(limit)
                        .try_collect()
                        .await?;
                    Ok(ExpandTree::Intermediate {
                        expanded: userset.clone(),
                        operation: SetOperation::Union,
                        children,
                    })
                }

                Rewrite::Union(children) | Rewrite::Intersection(children) => {
                    let operation = if matches!(rewrite, Rewrite::Union(_)) {
                        SetOperation::Union
                    } else {
                        SetOperation::Intersection
                    };
                    let mut branches = Vec::with_capacity(children.len());
                    for child in children {
                        let branch =
                            self.expand_rewrite(child, userset, mode, revision, stats, depth);
                        branches.push(branch);
                    }
                    let children: Vec<ExpandTree> = futures::stream::iter(branches)
                        .buffered(limit)
                        .try_collect()
                        .await?;
                    Ok(ExpandTree::Intermediate {
                        expanded: userset.clone(),
                        operation,
                        children,
                    })
                }

                Rewrite::Exclusion { base, subtract } => {
                    let (base, subtract) = futures::try_join!(
                        self.expand_rewrite(base, userset, mode, revision, stats, depth),
                        self.expand_rewrite(subtract, userset, mode, revision, stats, depth),
                    )?;
                    Ok(ExpandTree::Intermediate {
                        expanded: userset.clone(),
                        operation: SetOperation::Exclusion,
                        children: vec![base, subtract],
                    })
                }
            }
        }
        .boxed()
    }

    async fn expand_direct(
        &self,
        userset: &ObjectAndRelation,
        mode: ExpandMode,
        revision: Revision,
        stats: &RequestStats,
        depth: u32,
    ) -> Result<ExpandTree, Error> {
        let tuples = self
            .datastore
            .query_tuples(&TupleFilter::for_userset(userset), revision)
            .await?;
        let subjects: Vec<SubjectRef> = tuples.into_iter().map(|tuple| tuple.subject).collect();

        let nested: Vec<ObjectAndRelation> = match mode {
            ExpandMode::Shallow => Vec::new(),
            ExpandMode::Recursive => subjects.iter().filter_map(SubjectRef::as_userset).collect(),
        };
        let leaf = ExpandTree::Leaf {
            expanded: userset.clone(),
            subjects,
        };
        if nested.is_empty() {
            return Ok(leaf);
        }

        let mut branches = Vec::with_capacity(nested.len());
        for onr in nested {
            branches.push(self.expand_userset(onr, mode, revision, stats, depth - 1));
        }
        let expanded: Vec<ExpandTree> = futures::stream::iter(branches)
            .buffered(self.config.concurrency_limit.max(1))
            .try_collect()
            .await?;

        let mut children = Vec::with_capacity(expanded.len() + 1);
        children.push(leaf);
        children.extend(expanded);
        Ok(ExpandTree::Intermediate {
            expanded: userset.clone(),
            operation: SetOperation::Union,
            children,
        })
    }
}
