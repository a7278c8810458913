//! The permissions service facade.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::builder::{NoDatastore, PermissionsServiceBuilder};
use super::consistency::resolve_revision;
use crate::config::{DispatchConfig, NamespaceCacheConfig};
use crate::datastore::Datastore;
use crate::dispatch::{
    CheckRequest, Dispatcher, ExpandMode, ExpandRequest, ExpandTree, LocalDispatcher,
    LookupRequest, LookupStream, Membership, ResponseMeta,
};
use crate::namespace::CachingNamespaceManager;
use crate::types::{ConsistencyRequirement, ConsistencyToken, ObjectRef, Revision, SubjectRef};
use crate::Error;

// ============================================================================
// Requests and responses
// ============================================================================

/// Does `subject` have `permission` on `resource`?
///
/// ```rust
/// use inferadb_graph::service::CheckPermissionRequest;
/// use inferadb_graph::{ObjectRef, SubjectRef};
///
/// let request = CheckPermissionRequest::builder()
///     .resource(ObjectRef::new("document", "readme"))
///     .permission("viewer")
///     .subject(SubjectRef::object("user", "alice"))
///     .build();
/// assert!(request.consistency.is_eventual());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct CheckPermissionRequest {
    /// The resource.
    pub resource: ObjectRef,
    /// The relation or permission.
    #[builder(into)]
    pub permission: String,
    /// The subject.
    pub subject: SubjectRef,
    /// Required freshness.
    #[builder(default)]
    pub consistency: ConsistencyRequirement,
}

/// Result of [`PermissionsService::check_permission`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckPermissionResponse {
    /// The answer.
    pub membership: Membership,
    /// Token of the revision the check was evaluated at.
    pub checked_at: ConsistencyToken,
    /// What it cost.
    pub meta: ResponseMeta,
}

/// Expand `permission` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct ExpandPermissionTreeRequest {
    /// The resource.
    pub resource: ObjectRef,
    /// The relation or permission.
    #[builder(into)]
    pub permission: String,
    /// How far to follow userset subjects.
    #[builder(default)]
    pub mode: ExpandMode,
    /// Required freshness.
    #[builder(default)]
    pub consistency: ConsistencyRequirement,
}

/// Result of [`PermissionsService::expand_permission_tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandPermissionTreeResponse {
    /// The subject tree.
    pub tree: ExpandTree,
    /// Token of the revision the tree was built at.
    pub expanded_at: ConsistencyToken,
    /// What it cost.
    pub meta: ResponseMeta,
}

/// Find objects of `resource_type` on which `subject` has `permission`.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct LookupResourcesRequest {
    /// The object type to search.
    #[builder(into)]
    pub resource_type: String,
    /// The relation or permission.
    #[builder(into)]
    pub permission: String,
    /// The subject.
    pub subject: SubjectRef,
    /// Required freshness.
    #[builder(default)]
    pub consistency: ConsistencyRequirement,
}

/// Result of [`PermissionsService::lookup_resources`].
#[derive(Debug)]
pub struct LookupResourcesResponse {
    /// The matching resource IDs.
    pub resources: LookupStream,
    /// Token of the revision the lookup runs at.
    pub looked_up_at: ConsistencyToken,
}

// ============================================================================
// Service
// ============================================================================

/// Transport-agnostic entry point for permission queries.
///
/// Resolves each request's consistency requirement to a revision, validates
/// it against the datastore's GC window, and hands the request to the
/// dispatcher. Every response carries the token of the revision it was
/// evaluated at.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use inferadb_graph::datastore::MemoryDatastore;
/// use inferadb_graph::service::{CheckPermissionRequest, PermissionsService};
/// use inferadb_graph::{ConsistencyRequirement, ObjectRef, SubjectRef};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryDatastore::new());
/// let revision = inferadb_graph::testing::load_standard_fixture(store.as_ref()).await?;
/// let service = PermissionsService::builder().datastore(store).build();
///
/// let response = service
///     .check_permission(
///         CheckPermissionRequest::builder()
///             .resource(ObjectRef::new("document", "healthplan"))
///             .permission("viewer")
///             .subject(SubjectRef::object("user", "chief_financial_officer"))
///             .consistency(ConsistencyRequirement::AtLeastAsFresh(revision.into()))
///             .build(),
///     )
///     .await?;
/// assert!(response.membership.is_member());
/// # Ok::<(), inferadb_graph::Error>(())
/// # });
/// ```
#[derive(Clone)]
pub struct PermissionsService {
    datastore: Arc<dyn Datastore>,
    namespaces: Arc<CachingNamespaceManager>,
    dispatcher: Arc<dyn Dispatcher>,
    timeout: Option<Duration>,
}

impl PermissionsService {
    /// Creates a new service builder.
    pub fn builder() -> PermissionsServiceBuilder<NoDatastore> {
        PermissionsServiceBuilder::new()
    }

    /// Creates a service evaluating requests with a [`LocalDispatcher`].
    pub fn new(
        datastore: Arc<dyn Datastore>,
        cache_config: NamespaceCacheConfig,
        dispatch_config: DispatchConfig,
    ) -> Self {
        let namespaces = Arc::new(CachingNamespaceManager::new(
            Arc::clone(&datastore),
            cache_config,
        ));
        let timeout = dispatch_config.timeout;
        let dispatcher = Arc::new(LocalDispatcher::new(
            Arc::clone(&datastore),
            Arc::clone(&namespaces),
            dispatch_config,
        ));
        Self {
            datastore,
            namespaces,
            dispatcher,
            timeout,
        }
    }

    /// Returns the namespace manager shared by every request.
    pub fn namespaces(&self) -> &Arc<CachingNamespaceManager> {
        &self.namespaces
    }

    /// Returns the datastore.
    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    /// Decides whether the subject has the permission.
    pub async fn check_permission(
        &self,
        request: CheckPermissionRequest,
    ) -> Result<CheckPermissionResponse, Error> {
        self.with_deadline("check", async {
            let revision = self.resolve(&request.consistency).await?;
            let result = self
                .dispatcher
                .check(CheckRequest {
                    resource: request.resource.with_relation(request.permission.clone()),
                    subject: request.subject.clone(),
                    revision,
                })
                .await?;
            Ok(CheckPermissionResponse {
                membership: result.membership,
                checked_at: ConsistencyToken::from_revision(revision),
                meta: result.meta,
            })
        })
        .await
    }

    /// Builds the subject tree of the permission.
    pub async fn expand_permission_tree(
        &self,
        request: ExpandPermissionTreeRequest,
    ) -> Result<ExpandPermissionTreeResponse, Error> {
        self.with_deadline("expand", async {
            let revision = self.resolve(&request.consistency).await?;
            let result = self
                .dispatcher
                .expand(ExpandRequest {
                    resource: request.resource.with_relation(request.permission.clone()),
                    mode: request.mode,
                    revision,
                })
                .await?;
            Ok(ExpandPermissionTreeResponse {
                tree: result.tree,
                expanded_at: ConsistencyToken::from_revision(revision),
                meta: result.meta,
            })
        })
        .await
    }

    /// Starts streaming the resources the subject can reach.
    ///
    /// Errors found while validating the request are returned here; errors
    /// found later arrive through the stream.
    pub async fn lookup_resources(
        &self,
        request: LookupResourcesRequest,
    ) -> Result<LookupResourcesResponse, Error> {
        let revision = self.resolve(&request.consistency).await?;
        let resources = self
            .dispatcher
            .lookup_resources(LookupRequest {
                resource_type: request.resource_type,
                permission: request.permission,
                subject: request.subject,
                revision,
            })
            .await?;
        Ok(LookupResourcesResponse {
            resources,
            looked_up_at: ConsistencyToken::from_revision(revision),
        })
    }

    async fn resolve(&self, consistency: &ConsistencyRequirement) -> Result<Revision, Error> {
        let revision = resolve_revision(self.datastore.as_ref(), consistency).await?;
        tracing::trace!(revision = %revision, ?consistency, "resolved revision");
        Ok(revision)
    }

    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        let Some(timeout) = self.timeout else {
            return future.await;
        };
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = duration_millis(timeout),
                    "deadline exceeded"
                );
                Err(Error::timeout(format!(
                    "{} did not complete within {:?}",
                    operation, timeout
                )))
            }
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl fmt::Debug for PermissionsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionsService")
            .field("namespaces", &self.namespaces)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
