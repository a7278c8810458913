//! Testing utilities for applications built on the graph engine.
//!
//! - [`load_standard_fixture`]: the document/folder/user world used across
//!   the test suite
//! - [`InstrumentedDatastore`]: a datastore wrapper with read counters and
//!   injectable failures
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use inferadb_graph::datastore::MemoryDatastore;
//! use inferadb_graph::service::{LookupResourcesRequest, PermissionsService};
//! use inferadb_graph::testing::load_standard_fixture;
//! use inferadb_graph::{ConsistencyRequirement, SubjectRef};
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryDatastore::new());
//! let revision = load_standard_fixture(store.as_ref()).await?;
//! let service = PermissionsService::builder().datastore(store).build();
//!
//! let response = service
//!     .lookup_resources(
//!         LookupResourcesRequest::builder()
//!             .resource_type("document")
//!             .permission("viewer")
//!             .subject(SubjectRef::object("user", "legal"))
//!             .consistency(ConsistencyRequirement::AtLeastAsFresh(revision.into()))
//!             .build(),
//!     )
//!     .await?;
//! let ids = response.resources.collect_ids().await?;
//! assert!(ids.contains("masterplan"));
//! assert!(ids.contains("companyplan"));
//! # Ok::<(), inferadb_graph::Error>(())
//! # });
//! ```

mod fixtures;
mod instrumented;

pub use fixtures::{STANDARD_TUPLES, load_standard_fixture, standard_namespaces, standard_tuples};
pub use instrumented::InstrumentedDatastore;
