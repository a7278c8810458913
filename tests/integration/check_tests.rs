//! Check integration tests.

use std::sync::Arc;

use inferadb_graph::datastore::{Datastore, MemoryDatastore, TupleUpdate};
use inferadb_graph::dispatch::Membership;
use inferadb_graph::service::{CheckPermissionRequest, PermissionsService};
use inferadb_graph::testing::InstrumentedDatastore;
use inferadb_graph::{
    ConsistencyRequirement, DispatchConfig, Error, ErrorKind, NamespaceCacheConfig,
    NamespaceDefinition, ObjectRef, Relation, Rewrite, SubjectRef,
};
use test_case::test_case;

use crate::common::{TestFixture, init_tracing};

#[test_case("document:masterplan", "viewer", "user:eng_lead", true ; "direct viewer")]
#[test_case("document:masterplan", "viewer", "user:product_manager", true ; "owner implies viewer")]
#[test_case("document:masterplan", "editor", "user:product_manager", true ; "owner implies editor")]
#[test_case("document:masterplan", "editor", "user:eng_lead", false ; "viewer is not editor")]
#[test_case("document:masterplan", "viewer", "user:vp_product", true ; "parent folder owner")]
#[test_case("document:masterplan", "viewer", "user:owner", true ; "grandparent folder owner")]
#[test_case("document:masterplan", "viewer", "user:auditor", true ; "userset subject on ancestor")]
#[test_case("document:healthplan", "viewer", "user:chief_financial_officer", true ; "plans folder viewer")]
#[test_case("document:healthplan", "viewer", "user:legal", false ; "plans is not under company")]
#[test_case("document:companyplan", "viewer", "user:villain", false ; "isolated folder")]
#[test_case("document:specialplan", "viewer_and_editor", "user:multiroleguy", true ; "intersection")]
#[test_case("document:specialplan", "viewer_and_editor", "user:missingrolegal", false ; "intersection missing editor")]
#[test_case("document:specialplan", "viewer_and_editor_derived", "user:multiroleguy", true ; "derived intersection")]
#[test_case("folder:company", "viewer", "folder:auditors#viewer", true ; "userset subject itself")]
#[test_case("folder:auditors", "viewer", "folder:auditors#viewer", true ; "userset subject of its own set")]
#[tokio::test]
async fn test_check_fixture(resource: &str, permission: &str, subject: &str, expected: bool) {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let membership = fixture
        .check(resource, permission, subject)
        .await
        .expect("Check should succeed");
    assert_eq!(
        membership,
        Membership::from(expected),
        "{}#{}@{}",
        resource,
        permission,
        subject
    );
}

#[tokio::test]
async fn test_check_reports_cost() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let response = fixture
        .service
        .check_permission(
            CheckPermissionRequest::builder()
                .resource(ObjectRef::new("document", "masterplan"))
                .permission("viewer")
                .subject(SubjectRef::object("user", "owner"))
                .consistency(fixture.fresh())
                .build(),
        )
        .await
        .expect("Check should succeed");
    assert!(response.membership.is_member());
    assert!(response.meta.dispatch_count >= 3);
    assert!(response.meta.depth_required >= 3);
}

#[test_case("document:masterplan", "invalidrelation", "user:legal" ; "unknown permission")]
#[test_case("document:masterplan", "viewer", "user:someuser#invalidrelation" ; "unknown subject relation")]
#[test_case("invalidnamespace:thing", "viewer", "user:legal" ; "unknown resource type")]
#[test_case("document:masterplan", "viewer", "invalidnamespace:someone" ; "unknown subject type")]
#[tokio::test]
async fn test_check_schema_violation(resource: &str, permission: &str, subject: &str) {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let err = fixture
        .check(resource, permission, subject)
        .await
        .expect_err("Check should be rejected");
    let err = err.downcast::<Error>().expect("engine error");
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
}

#[tokio::test]
async fn test_tuple_to_missing_namespace_is_not_member() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let written = fixture
        .store
        .write_tuples(vec![TupleUpdate::touch(
            "document:orphan#parent@ghost:thing".parse().unwrap(),
        )])
        .await
        .unwrap();

    let response = fixture
        .service
        .check_permission(
            CheckPermissionRequest::builder()
                .resource(ObjectRef::new("document", "orphan"))
                .permission("viewer")
                .subject(SubjectRef::object("user", "legal"))
                .consistency(ConsistencyRequirement::AtLeastAsFresh(written.into()))
                .build(),
        )
        .await
        .expect("Check should succeed");
    assert_eq!(response.membership, Membership::NotMember);
}

#[tokio::test]
async fn test_schema_cycle_exhausts_depth() {
    init_tracing();
    let store = Arc::new(MemoryDatastore::new());
    store.write_namespace(NamespaceDefinition::new("user")).await.unwrap();
    let written = store
        .write_namespace(
            NamespaceDefinition::new("group")
                .with_relation(Relation::new(
                    "member",
                    Rewrite::Union(vec![Rewrite::This, Rewrite::computed("alias")]),
                ))
                .with_relation(Relation::new("alias", Rewrite::computed("member"))),
        )
        .await
        .unwrap();

    let service = PermissionsService::builder()
        .datastore(store)
        .dispatch_config(DispatchConfig::builder().max_depth(10).build())
        .build();
    let err = service
        .check_permission(
            CheckPermissionRequest::builder()
                .resource(ObjectRef::new("group", "eng"))
                .permission("member")
                .subject(SubjectRef::object("user", "alice"))
                .consistency(ConsistencyRequirement::AtLeastAsFresh(written.into()))
                .build(),
        )
        .await
        .expect_err("A cyclic schema should never resolve");
    assert_eq!(err.kind(), ErrorKind::MaxDepthExceeded);
}

#[tokio::test]
async fn test_datastore_failure_aborts_check() {
    let store = Arc::new(InstrumentedDatastore::new(Arc::new(MemoryDatastore::new())));
    let fixture = TestFixture::with_store(
        store.clone(),
        NamespaceCacheConfig::default(),
        DispatchConfig::default(),
    )
    .await
    .expect("Failed to create test fixture");

    store.fail_tuple_reads(Error::unavailable("connection reset"));
    let err = fixture
        .check("document:masterplan", "viewer", "user:legal")
        .await
        .expect_err("Check should fail while the store is down")
        .downcast::<Error>()
        .expect("engine error");
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(err.is_retriable());

    store.clear_failure();
    let membership = fixture
        .check("document:masterplan", "viewer", "user:legal")
        .await
        .expect("Check should succeed once the store recovers");
    assert!(membership.is_member());
}

#[tokio::test]
async fn test_namespace_reads_are_cached() {
    let store = Arc::new(InstrumentedDatastore::new(Arc::new(MemoryDatastore::new())));
    let fixture = TestFixture::with_store(
        store.clone(),
        NamespaceCacheConfig::default(),
        DispatchConfig::default(),
    )
    .await
    .expect("Failed to create test fixture");

    let cold = fixture
        .check("document:masterplan", "viewer", "user:auditor")
        .await
        .unwrap();
    let after_cold = store.namespace_reads();
    assert!(after_cold > 0);

    let warm = fixture
        .check("document:masterplan", "viewer", "user:auditor")
        .await
        .unwrap();
    assert_eq!(cold, warm);
    assert_eq!(store.namespace_reads(), after_cold);
}

#[tokio::test]
async fn test_exclusion_through_service() {
    init_tracing();
    let store: Arc<dyn Datastore> = Arc::new(MemoryDatastore::new());
    store.write_namespace(NamespaceDefinition::new("user")).await.unwrap();
    store
        .write_namespace(
            NamespaceDefinition::new("document")
                .with_relation(Relation::direct("viewer"))
                .with_relation(Relation::direct("banned"))
                .with_relation(Relation::new(
                    "can_view",
                    Rewrite::exclusion(Rewrite::computed("viewer"), Rewrite::computed("banned")),
                )),
        )
        .await
        .unwrap();
    let written = store
        .write_tuples(
            [
                "document:readme#viewer@user:alice",
                "document:readme#viewer@user:mallory",
                "document:readme#banned@user:mallory",
            ]
            .iter()
            .map(|s| TupleUpdate::touch(s.parse().unwrap()))
            .collect(),
        )
        .await
        .unwrap();

    let service = PermissionsService::builder().datastore(store).build();
    for (subject, expected) in [("alice", true), ("mallory", false), ("bob", false)] {
        let response = service
            .check_permission(
                CheckPermissionRequest::builder()
                    .resource(ObjectRef::new("document", "readme"))
                    .permission("can_view")
                    .subject(SubjectRef::object("user", subject))
                    .consistency(ConsistencyRequirement::AtExactSnapshot(written.into()))
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(response.membership.is_member(), expected, "user:{}", subject);
    }
}
