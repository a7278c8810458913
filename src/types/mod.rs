//! Core types for the graph engine.
//!
//! - [`RelationTuple`]: a stored fact (resource, relation, subject)
//! - [`NamespaceDefinition`]: an object type and its relation rewrites
//! - [`Revision`]: the logical timestamp every read is pinned to
//! - [`ConsistencyToken`]: opaque snapshot token for read-after-write consistency

mod consistency;
mod namespace;
mod relationship;
mod revision;

pub use consistency::{ConsistencyRequirement, ConsistencyToken};
pub use namespace::{NamespaceDefinition, Relation, Rewrite};
pub use relationship::{ELLIPSIS, ObjectAndRelation, ObjectRef, RelationTuple, SubjectRef};
pub use revision::Revision;
