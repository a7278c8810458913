//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types for easy importing:
//!
//! ```rust
//! use inferadb_graph::prelude::*;
//! ```
//!
//! This provides access to:
//! - The service facade and its requests
//! - Error types
//! - Storage types
//! - Common data types

pub use crate::{
    config::{DatastoreConfig, DispatchConfig, NamespaceCacheConfig},
    datastore::{Datastore, MemoryDatastore, TupleFilter, TupleUpdate},
    dispatch::{Dispatcher, ExpandMode, ExpandTree, LocalDispatcher, Membership},
    error::{Error, ErrorKind, Result},
    namespace::CachingNamespaceManager,
    service::{
        CheckPermissionRequest, ExpandPermissionTreeRequest, LookupResourcesRequest,
        PermissionsService,
    },
    types::{
        ConsistencyRequirement, ConsistencyToken, NamespaceDefinition, ObjectAndRelation,
        ObjectRef, Relation, RelationTuple, Revision, Rewrite, SubjectRef,
    },
};
