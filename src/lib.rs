//! # InferaDB Graph
//!
//! Relationship-based permission evaluation over a revisioned tuple store.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use inferadb_graph::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryDatastore::new());
//! store
//!     .write_namespace(NamespaceDefinition::new("user"))
//!     .await?;
//! store
//!     .write_namespace(
//!         NamespaceDefinition::new("document")
//!             .with_relation(Relation::direct("owner"))
//!             .with_relation(Relation::new(
//!                 "viewer",
//!                 Rewrite::Union(vec![Rewrite::This, Rewrite::computed("owner")]),
//!             )),
//!     )
//!     .await?;
//! let written = store
//!     .write_tuples(vec![TupleUpdate::touch("document:readme#owner@user:alice".parse()?)])
//!     .await?;
//!
//! let service = PermissionsService::builder().datastore(store).build();
//! let response = service
//!     .check_permission(
//!         CheckPermissionRequest::builder()
//!             .resource(ObjectRef::new("document", "readme"))
//!             .permission("viewer")
//!             .subject(SubjectRef::object("user", "alice"))
//!             .consistency(ConsistencyRequirement::AtLeastAsFresh(written.into()))
//!             .build(),
//!     )
//!     .await?;
//! assert!(response.membership.is_member());
//! # Ok::<(), inferadb_graph::Error>(())
//! # });
//! ```
//!
//! ## Key Concepts
//!
//! - **Revisions**: every read is pinned to one [`Revision`]; responses carry
//!   a [`ConsistencyToken`] for the revision they were evaluated at
//! - **Tuple Order**: `resource#relation@subject`, "resource has relation subject"
//! - **Denial ≠ Error**: a check returns
//!   [`Membership::NotMember`](dispatch::Membership::NotMember) for a denied
//!   subject, never `Err`
//!
//! ## Modules
//!
//! - [`datastore`]: the revisioned storage contract and an in-memory store
//! - [`namespace`]: TTL-caching access to namespace definitions
//! - [`dispatch`]: Check, Expand and LookupResources evaluation
//! - [`service`]: consistency resolution in front of the dispatcher
//! - [`testing`]: fixtures and a failure-injecting datastore wrapper

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Core modules
pub mod config;
pub mod error;
pub mod types;

// Storage and schema
pub mod datastore;
pub mod namespace;

// Evaluation
pub mod dispatch;
pub mod service;

// Testing utilities
pub mod testing;

// Prelude for convenient imports
pub mod prelude;

// Re-export main types at crate root for convenience
pub use error::{Error, ErrorKind, Result};
pub use types::{
    ConsistencyRequirement, ConsistencyToken, ELLIPSIS, NamespaceDefinition, ObjectAndRelation,
    ObjectRef, Relation, RelationTuple, Revision, Rewrite, SubjectRef,
};

// Re-export config types
pub use config::{DatastoreConfig, DispatchConfig, NamespaceCacheConfig};
