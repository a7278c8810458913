//! Common test harness for graph engine integration tests.
//!
//! Provides the standard fixture behind a [`PermissionsService`] and a few
//! shorthand queries.

use std::collections::HashSet;
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::Result;
use inferadb_graph::datastore::{Datastore, MemoryDatastore, TupleUpdate};
use inferadb_graph::dispatch::Membership;
use inferadb_graph::service::{
    CheckPermissionRequest, LookupResourcesRequest, PermissionsService,
};
use inferadb_graph::testing::load_standard_fixture;
use inferadb_graph::{
    ConsistencyRequirement, DatastoreConfig, DispatchConfig, NamespaceCacheConfig,
    NamespaceDefinition, ObjectRef, RelationTuple, Revision, SubjectRef,
};

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// The standard world loaded into a fresh store.
pub struct TestFixture {
    pub store: Arc<dyn Datastore>,
    pub service: PermissionsService,
    /// Revision at which the whole fixture is visible.
    pub revision: Revision,
}

impl TestFixture {
    /// Fixture with default configuration.
    pub async fn create() -> Result<Self> {
        Self::with_datastore_config(DatastoreConfig::default()).await
    }

    /// Fixture whose optimized revision lags the head by up to `fuzzing`.
    pub async fn with_fuzzing(fuzzing: Duration) -> Result<Self> {
        Self::with_datastore_config(
            DatastoreConfig::builder().revision_fuzzing(fuzzing).build(),
        )
        .await
    }

    pub async fn with_datastore_config(config: DatastoreConfig) -> Result<Self> {
        let store: Arc<dyn Datastore> = Arc::new(MemoryDatastore::with_config(config));
        Self::with_store(store, NamespaceCacheConfig::default(), DispatchConfig::default()).await
    }

    /// Loads the fixture into `store` and builds a service over it.
    pub async fn with_store(
        store: Arc<dyn Datastore>,
        cache_config: NamespaceCacheConfig,
        dispatch_config: DispatchConfig,
    ) -> Result<Self> {
        init_tracing();
        let revision = load_standard_fixture(store.as_ref()).await?;
        let service = PermissionsService::builder()
            .datastore(Arc::clone(&store))
            .cache_config(cache_config)
            .dispatch_config(dispatch_config)
            .build();
        Ok(Self {
            store,
            service,
            revision,
        })
    }

    /// A custom world: the given namespaces plus tuples in text form, e.g.
    /// `group:eng#member@user:alice`.
    pub async fn with_world(
        namespaces: Vec<NamespaceDefinition>,
        tuples: &[String],
        dispatch_config: DispatchConfig,
    ) -> Result<Self> {
        init_tracing();
        let store: Arc<dyn Datastore> = Arc::new(MemoryDatastore::new());
        let mut revision = store.head_revision().await?;
        for namespace in namespaces {
            revision = store.write_namespace(namespace).await?;
        }
        let updates = tuples
            .iter()
            .map(|tuple| Ok(TupleUpdate::create(tuple.parse::<RelationTuple>()?)))
            .collect::<Result<Vec<_>>>()?;
        if !updates.is_empty() {
            revision = store.write_tuples(updates).await?;
        }

        let service = PermissionsService::builder()
            .datastore(Arc::clone(&store))
            .dispatch_config(dispatch_config)
            .build();
        Ok(Self {
            store,
            service,
            revision,
        })
    }

    /// At least as fresh as the fixture load.
    pub fn fresh(&self) -> ConsistencyRequirement {
        ConsistencyRequirement::AtLeastAsFresh(self.revision.into())
    }

    /// Checks `subject` against `resource#permission`, e.g.
    /// `check("document:masterplan", "viewer", "user:eng_lead")`.
    pub async fn check(
        &self,
        resource: &str,
        permission: &str,
        subject: &str,
    ) -> Result<Membership> {
        let response = self
            .service
            .check_permission(
                CheckPermissionRequest::builder()
                    .resource(resource.parse::<ObjectRef>()?)
                    .permission(permission)
                    .subject(subject.parse::<SubjectRef>()?)
                    .consistency(self.fresh())
                    .build(),
            )
            .await?;
        Ok(response.membership)
    }

    /// Collects every `resource_type` the subject reaches via `permission`.
    pub async fn lookup(
        &self,
        resource_type: &str,
        permission: &str,
        subject: &str,
    ) -> Result<HashSet<String>> {
        let response = self
            .service
            .lookup_resources(
                LookupResourcesRequest::builder()
                    .resource_type(resource_type)
                    .permission(permission)
                    .subject(subject.parse::<SubjectRef>()?)
                    .consistency(self.fresh())
                    .build(),
            )
            .await?;
        Ok(response.resources.collect_ids().await?)
    }
}

/// Builds an ID set from string literals.
pub fn ids(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
