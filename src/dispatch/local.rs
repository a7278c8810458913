//! In-process dispatcher.

use std::fmt;
use std::sync::Arc;

use super::{
    CheckRequest, CheckResult, Dispatcher, ExpandRequest, ExpandResult, LookupRequest,
    LookupStream, RequestStats,
};
use crate::config::DispatchConfig;
use crate::datastore::Datastore;
use crate::namespace::CachingNamespaceManager;
use crate::types::{NamespaceDefinition, Revision, SubjectRef};
use crate::{Error, ErrorKind};

/// State shared by every clone of a [`LocalDispatcher`] and by its lookup
/// producers.
pub(super) struct Inner {
    pub(super) datastore: Arc<dyn Datastore>,
    pub(super) namespaces: Arc<CachingNamespaceManager>,
    pub(super) config: DispatchConfig,
}

impl Inner {
    /// Loads a namespace that a request names, turning absence into a schema
    /// error.
    pub(super) async fn require_namespace(
        &self,
        name: &str,
        revision: Revision,
    ) -> Result<Arc<NamespaceDefinition>, Error> {
        match self.namespaces.read_namespace(name, revision).await {
            Ok(definition) => Ok(definition),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::schema_violation(
                format!("object definition `{}` not found", name),
            )
            .with_source(err)),
            Err(err) => Err(err),
        }
    }

    /// Validates the names a request refers to before any tuple is read.
    pub(super) async fn validate(
        &self,
        resource_type: &str,
        relation: &str,
        subject: Option<&SubjectRef>,
        revision: Revision,
    ) -> Result<(), Error> {
        let resource = self.require_namespace(resource_type, revision).await?;
        if !resource.has_relation(relation) {
            return Err(Error::schema_violation(format!(
                "relation `{}` not found under definition `{}`",
                relation, resource_type
            )));
        }

        if let Some(subject) = subject {
            let subject_type = &subject.object.object_type;
            let definition = self.require_namespace(subject_type, revision).await?;
            if let Some(subject_relation) = &subject.relation
                && !definition.has_relation(subject_relation)
            {
                return Err(Error::schema_violation(format!(
                    "subject relation `{}` not found under definition `{}`",
                    subject_relation, subject_type
                )));
            }
        }
        Ok(())
    }
}

/// A [`Dispatcher`] that evaluates every request in the current process.
///
/// Cheap to clone; clones share the datastore, the namespace cache and the
/// configuration.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use inferadb_graph::datastore::MemoryDatastore;
/// use inferadb_graph::dispatch::{CheckRequest, Dispatcher, LocalDispatcher, Membership};
/// use inferadb_graph::namespace::CachingNamespaceManager;
/// use inferadb_graph::{DispatchConfig, NamespaceCacheConfig, SubjectRef};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryDatastore::new());
/// let revision = inferadb_graph::testing::load_standard_fixture(store.as_ref()).await?;
/// let namespaces = Arc::new(CachingNamespaceManager::new(
///     store.clone(),
///     NamespaceCacheConfig::default(),
/// ));
/// let dispatcher = LocalDispatcher::new(store, namespaces, DispatchConfig::default());
///
/// let result = dispatcher
///     .check(CheckRequest {
///         resource: "document:masterplan".parse::<inferadb_graph::ObjectRef>()?.with_relation("viewer"),
///         subject: SubjectRef::object("user", "eng_lead"),
///         revision,
///     })
///     .await?;
/// assert_eq!(result.membership, Membership::Member);
/// # Ok::<(), inferadb_graph::Error>(())
/// # });
/// ```
#[derive(Clone)]
pub struct LocalDispatcher {
    inner: Arc<Inner>,
}

impl LocalDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        datastore: Arc<dyn Datastore>,
        namespaces: Arc<CachingNamespaceManager>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                datastore,
                namespaces,
                config,
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Returns the namespace manager.
    pub fn namespaces(&self) -> &Arc<CachingNamespaceManager> {
        &self.inner.namespaces
    }
}

impl fmt::Debug for LocalDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDispatcher")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Dispatcher for LocalDispatcher {
    async fn check(&self, request: CheckRequest) -> Result<CheckResult, Error> {
        let inner = &self.inner;
        inner
            .validate(
                &request.resource.object.object_type,
                &request.resource.relation,
                Some(&request.subject),
                request.revision,
            )
            .await?;

        let stats = RequestStats::new(inner.config.max_depth);
        let membership = inner
            .check_userset(
                request.resource.clone(),
                &request.subject,
                request.revision,
                &stats,
                inner.config.max_depth,
            )
            .await?;

        let meta = stats.meta();
        tracing::debug!(
            resource = %request.resource,
            subject = %request.subject,
            revision = %request.revision,
            %membership,
            dispatch_count = meta.dispatch_count,
            depth_required = meta.depth_required,
            "check complete"
        );
        Ok(CheckResult { membership, meta })
    }

    async fn expand(&self, request: ExpandRequest) -> Result<ExpandResult, Error> {
        let inner = &self.inner;
        inner
            .validate(
                &request.resource.object.object_type,
                &request.resource.relation,
                None,
                request.revision,
            )
            .await?;

        let stats = RequestStats::new(inner.config.max_depth);
        let tree = inner
            .expand_userset(
                request.resource.clone(),
                request.mode,
                request.revision,
                &stats,
                inner.config.max_depth,
            )
            .await?;

        let meta = stats.meta();
        tracing::debug!(
            resource = %request.resource,
            revision = %request.revision,
            mode = ?request.mode,
            dispatch_count = meta.dispatch_count,
            "expand complete"
        );
        Ok(ExpandResult { tree, meta })
    }

    async fn lookup_resources(&self, request: LookupRequest) -> Result<LookupStream, Error> {
        self.inner
            .validate(
                &request.resource_type,
                &request.permission,
                Some(&request.subject),
                request.revision,
            )
            .await?;
        Ok(LookupStream::spawn(Arc::clone(&self.inner), request))
    }
}
