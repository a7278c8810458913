//! The revisioned storage contract.
//!
//! A [`Datastore`] holds relationship tuples and namespace definitions. Every
//! mutation is stamped with a strictly increasing [`Revision`] and every read
//! is pinned to one, so a whole request observes a single consistent
//! snapshot.
//!
//! Revision fuzzing and the garbage-collection window live entirely behind
//! this trait: callers only see them through
//! [`optimized_revision`](Datastore::optimized_revision) and
//! [`check_revision`](Datastore::check_revision).

mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use memory::{GcShutdownHandle, GcStats, MemoryDatastore};

use crate::types::{NamespaceDefinition, ObjectAndRelation, RelationTuple, Revision, SubjectRef};
use crate::Error;

// ============================================================================
// Tuple filters
// ============================================================================

/// Selects tuples by any combination of their fields.
///
/// Unset fields match anything. `subject_relation` distinguishes "any
/// relation" (`None`) from "no relation" (`Some(None)`).
///
/// ## Example
///
/// ```rust
/// use inferadb_graph::datastore::TupleFilter;
/// use inferadb_graph::{ObjectRef, RelationTuple};
///
/// let filter = TupleFilter::for_userset(&ObjectRef::new("doc", "1").with_relation("viewer"));
/// let tuple: RelationTuple = "doc:1#viewer@user:alice".parse().unwrap();
/// assert!(filter.matches(&tuple));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TupleFilter {
    /// Resource type.
    pub object_type: Option<String>,
    /// Resource ID.
    pub object_id: Option<String>,
    /// Relation name.
    pub relation: Option<String>,
    /// Subject type.
    pub subject_type: Option<String>,
    /// Subject ID.
    pub subject_id: Option<String>,
    /// Subject relation.
    pub subject_relation: Option<Option<String>>,
}

impl TupleFilter {
    /// Creates a filter matching every tuple.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches the tuples stored directly under `onr`.
    pub fn for_userset(onr: &ObjectAndRelation) -> Self {
        Self {
            object_type: Some(onr.object.object_type.clone()),
            object_id: Some(onr.object.object_id.clone()),
            relation: Some(onr.relation.clone()),
            ..Self::default()
        }
    }

    /// Matches tuples whose subject is exactly `subject`.
    pub fn for_subject(subject: &SubjectRef) -> Self {
        Self {
            subject_type: Some(subject.object.object_type.clone()),
            subject_id: Some(subject.object.object_id.clone()),
            subject_relation: Some(subject.relation.clone()),
            ..Self::default()
        }
    }

    /// Restricts to a resource type.
    #[must_use]
    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    /// Restricts to a resource ID.
    #[must_use]
    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    /// Restricts to a relation.
    #[must_use]
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Restricts to a subject object, with any subject relation.
    #[must_use]
    pub fn with_subject_object(
        mut self,
        subject_type: impl Into<String>,
        subject_id: impl Into<String>,
    ) -> Self {
        self.subject_type = Some(subject_type.into());
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Returns `true` if `tuple` satisfies every set field.
    pub fn matches(&self, tuple: &RelationTuple) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().is_none_or(|f| f == value)
        }

        eq(&self.object_type, &tuple.resource.object_type)
            && eq(&self.object_id, &tuple.resource.object_id)
            && eq(&self.relation, &tuple.relation)
            && eq(&self.subject_type, &tuple.subject.object.object_type)
            && eq(&self.subject_id, &tuple.subject.object.object_id)
            && self
                .subject_relation
                .as_ref()
                .is_none_or(|r| *r == tuple.subject.relation)
    }
}

// ============================================================================
// Writes
// ============================================================================

/// The kind of a tuple mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TupleOperation {
    /// Insert; fails with `Conflict` if the tuple already exists.
    Create,
    /// Insert if absent.
    Touch,
    /// Remove if present.
    Delete,
}

impl fmt::Display for TupleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TupleOperation::Create => write!(f, "create"),
            TupleOperation::Touch => write!(f, "touch"),
            TupleOperation::Delete => write!(f, "delete"),
        }
    }
}

/// A single tuple mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleUpdate {
    /// What to do.
    pub operation: TupleOperation,
    /// The tuple it applies to.
    pub tuple: RelationTuple,
}

impl TupleUpdate {
    /// A `Create` update.
    pub fn create(tuple: RelationTuple) -> Self {
        Self {
            operation: TupleOperation::Create,
            tuple,
        }
    }

    /// A `Touch` update.
    pub fn touch(tuple: RelationTuple) -> Self {
        Self {
            operation: TupleOperation::Touch,
            tuple,
        }
    }

    /// A `Delete` update.
    pub fn delete(tuple: RelationTuple) -> Self {
        Self {
            operation: TupleOperation::Delete,
            tuple,
        }
    }
}

// ============================================================================
// Datastore trait
// ============================================================================

/// Revisioned storage for tuples and namespace definitions.
///
/// Reads take the revision they are pinned to. Implementations must be safe
/// to share across tasks.
#[async_trait::async_trait]
pub trait Datastore: Send + Sync {
    /// Returns the newest revision.
    async fn head_revision(&self) -> Result<Revision, Error>;

    /// Returns a revision at most the configured fuzzing window behind the
    /// head, never older than the GC horizon.
    async fn optimized_revision(&self) -> Result<Revision, Error>;

    /// Verifies `revision` is still readable.
    ///
    /// `RevisionTooOld` if it predates the GC window, `InvalidArgument` if it
    /// is newer than the head.
    async fn check_revision(&self, revision: Revision) -> Result<(), Error>;

    /// Returns the tuples matching `filter` as of `revision`.
    async fn query_tuples(
        &self,
        filter: &TupleFilter,
        revision: Revision,
    ) -> Result<Vec<RelationTuple>, Error>;

    /// Returns the namespace definition as of `revision`, together with the
    /// revision at which it was written. `NotFound` if absent.
    async fn read_namespace(
        &self,
        name: &str,
        revision: Revision,
    ) -> Result<(NamespaceDefinition, Revision), Error>;

    /// Returns every namespace definition as of `revision`.
    async fn list_namespaces(&self, revision: Revision) -> Result<Vec<NamespaceDefinition>, Error>;

    /// Applies `updates` atomically and returns the new revision.
    async fn write_tuples(&self, updates: Vec<TupleUpdate>) -> Result<Revision, Error>;

    /// Validates and stores a namespace definition, replacing any previous one.
    async fn write_namespace(&self, definition: NamespaceDefinition) -> Result<Revision, Error>;

    /// Deletes a namespace definition. `NotFound` if absent.
    async fn delete_namespace(&self, name: &str) -> Result<Revision, Error>;
}
