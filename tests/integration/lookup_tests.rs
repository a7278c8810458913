//! LookupResources integration tests.
//!
//! The expected sets are the objects a subject reaches in the standard
//! world, with and without revision fuzzing.

use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;
use inferadb_graph::service::LookupResourcesRequest;
use inferadb_graph::{
    DispatchConfig, Error, ErrorKind, NamespaceDefinition, Relation, Rewrite, SubjectRef,
};
use test_case::test_case;

use crate::common::{TestFixture, ids};

#[test_case("viewer", "user:eng_lead", &["masterplan"] ; "eng lead views masterplan")]
#[test_case("viewer", "user:product_manager", &["masterplan"] ; "product manager via owner")]
#[test_case("viewer", "user:chief_financial_officer", &["masterplan", "healthplan"] ; "cfo via plans folder")]
#[test_case("viewer", "user:auditor", &["masterplan", "companyplan"] ; "auditor via userset subject")]
#[test_case("viewer", "user:vp_product", &["masterplan"] ; "vp product via strategy owner")]
#[test_case("viewer", "user:legal", &["masterplan", "companyplan"] ; "legal via company viewer")]
#[test_case("viewer", "user:owner", &["masterplan", "companyplan"] ; "owner via company owner")]
#[test_case("viewer", "user:villain", &[] ; "villain sees nothing")]
#[test_case("viewer", "user:unknowngal", &[] ; "unknown subject sees nothing")]
#[test_case("viewer_and_editor", "user:eng_lead", &[] ; "intersection without editor")]
#[test_case("viewer_and_editor", "user:multiroleguy", &["specialplan"] ; "intersection satisfied")]
#[test_case("viewer_and_editor", "user:missingrolegal", &[] ; "intersection missing role")]
#[test_case("viewer_and_editor_derived", "user:multiroleguy", &["specialplan"] ; "derived intersection satisfied")]
#[test_case("viewer_and_editor_derived", "user:missingrolegal", &[] ; "derived intersection missing role")]
#[tokio::test]
async fn test_lookup_resources(permission: &str, subject: &str, expected: &[&str]) {
    for fuzzing in [Duration::ZERO, Duration::from_secs(1)] {
        let fixture = TestFixture::with_fuzzing(fuzzing)
            .await
            .expect("Failed to create test fixture");
        let found = fixture
            .lookup("document", permission, subject)
            .await
            .expect("Lookup should succeed");
        assert_eq!(
            found,
            ids(expected),
            "{} on document for {} with fuzzing {:?}",
            permission,
            subject,
            fuzzing
        );
    }
}

/// Every looked-up resource must also pass a check at the same revision.
#[test_case("viewer", "user:auditor")]
#[test_case("viewer", "user:chief_financial_officer")]
#[test_case("viewer_and_editor_derived", "user:multiroleguy")]
#[tokio::test]
async fn test_lookup_agrees_with_check(permission: &str, subject: &str) {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let found = fixture
        .lookup("document", permission, subject)
        .await
        .expect("Lookup should succeed");

    for id in ["masterplan", "companyplan", "healthplan", "specialplan"] {
        let membership = fixture
            .check(&format!("document:{}", id), permission, subject)
            .await
            .expect("Check should succeed");
        assert_eq!(
            membership.is_member(),
            found.contains(id),
            "check and lookup disagree on document:{}",
            id
        );
    }
}

#[tokio::test]
async fn test_lookup_folders() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let found = fixture
        .lookup("folder", "viewer", "user:owner")
        .await
        .expect("Lookup should succeed");
    assert_eq!(found, ids(&["company", "strategy"]));
}

#[tokio::test]
async fn test_lookup_with_userset_subject() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let found = fixture
        .lookup("folder", "viewer", "folder:auditors#viewer")
        .await
        .expect("Lookup should succeed");
    assert!(found.contains("auditors"));
    assert!(found.contains("company"));
    assert!(found.contains("strategy"));
}

#[test_case("document", "invalidrelation", "user:legal" ; "unknown permission")]
#[test_case("document", "viewer", "user:someuser#invalidrelation" ; "unknown subject relation")]
#[test_case("invalidnamespace", "viewer", "user:legal" ; "unknown resource type")]
#[test_case("document", "viewer", "invalidnamespace:someone" ; "unknown subject type")]
#[tokio::test]
async fn test_lookup_schema_violation(resource_type: &str, permission: &str, subject: &str) {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let err = fixture
        .service
        .lookup_resources(
            LookupResourcesRequest::builder()
                .resource_type(resource_type)
                .permission(permission)
                .subject(subject.parse::<SubjectRef>().expect("valid subject"))
                .consistency(fixture.fresh())
                .build(),
        )
        .await
        .expect_err("Lookup should be rejected before streaming");
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
}

#[tokio::test]
async fn test_lookup_stream_yields_each_id_once() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let response = fixture
        .service
        .lookup_resources(
            LookupResourcesRequest::builder()
                .resource_type("document")
                .permission("viewer")
                .subject(SubjectRef::object("user", "owner"))
                .consistency(fixture.fresh())
                .build(),
        )
        .await
        .expect("Lookup should start");
    assert_eq!(response.looked_up_at.revision().unwrap(), fixture.revision);

    let items: Vec<String> = response
        .resources
        .map(|item| item.expect("no errors in stream"))
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    let unique: HashSet<String> = items.into_iter().collect();
    assert_eq!(unique, ids(&["masterplan", "companyplan"]));
}

#[tokio::test]
async fn test_lookup_stream_dropped_early() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let mut stream = fixture
        .service
        .lookup_resources(
            LookupResourcesRequest::builder()
                .resource_type("document")
                .permission("viewer")
                .subject(SubjectRef::object("user", "legal"))
                .consistency(fixture.fresh())
                .build(),
        )
        .await
        .expect("Lookup should start")
        .resources;

    let first = stream.next().await.expect("at least one result").expect("no error");
    assert!(first == "masterplan" || first == "companyplan");
    drop(stream);

    // The service stays usable after a consumer walks away.
    let found = fixture
        .lookup("document", "viewer", "user:legal")
        .await
        .expect("Lookup should succeed");
    assert_eq!(found, ids(&["masterplan", "companyplan"]));
}

/// A small schema with its tuples and every resource ID of the looked-up
/// type.
struct World {
    namespaces: Vec<NamespaceDefinition>,
    tuples: Vec<String>,
    resource_type: &'static str,
    resource_ids: &'static [&'static str],
}

fn user() -> NamespaceDefinition {
    NamespaceDefinition::new("user")
}

fn group() -> NamespaceDefinition {
    NamespaceDefinition::new("group").with_relation(Relation::direct("member"))
}

fn tuples(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `can_read` is `reader` minus `banned`.
fn exclusion_world() -> World {
    World {
        namespaces: vec![
            user(),
            group(),
            NamespaceDefinition::new("doc")
                .with_relation(Relation::direct("reader"))
                .with_relation(Relation::direct("banned"))
                .with_relation(Relation::new(
                    "can_read",
                    Rewrite::exclusion(Rewrite::computed("reader"), Rewrite::computed("banned")),
                )),
        ],
        tuples: tuples(&[
            "doc:a#reader@user:alice",
            "doc:b#reader@user:alice",
            "doc:b#banned@user:alice",
            "doc:c#reader@group:eng#member",
            "doc:c#banned@user:bob",
            "group:eng#member@user:alice",
            "group:eng#member@user:bob",
        ]),
        resource_type: "doc",
        resource_ids: &["a", "b", "c"],
    }
}

/// The `parent` tuple of `d1` points at a userset rather than a plain folder.
fn arrow_world() -> World {
    World {
        namespaces: vec![
            user(),
            NamespaceDefinition::new("folder").with_relation(Relation::direct("viewer")),
            NamespaceDefinition::new("doc")
                .with_relation(Relation::direct("parent"))
                .with_relation(Relation::new(
                    "viewer",
                    Rewrite::Union(vec![
                        Rewrite::This,
                        Rewrite::tuple_to_userset("parent", "viewer"),
                    ]),
                )),
        ],
        tuples: tuples(&[
            "doc:d1#parent@folder:f1#viewer",
            "doc:d2#parent@folder:f2",
            "folder:f1#viewer@user:alice",
            "folder:f2#viewer@user:bob",
        ]),
        resource_type: "doc",
        resource_ids: &["d1", "d2"],
    }
}

/// `group:a` and `group:b` contain each other.
fn cyclic_world() -> World {
    World {
        namespaces: vec![
            user(),
            group(),
            NamespaceDefinition::new("doc").with_relation(Relation::direct("viewer")),
        ],
        tuples: tuples(&[
            "group:a#member@group:b#member",
            "group:b#member@group:a#member",
            "group:b#member@user:alice",
            "doc:x#viewer@group:a#member",
            "doc:y#viewer@user:bob",
        ]),
        resource_type: "doc",
        resource_ids: &["x", "y"],
    }
}

#[test_case(exclusion_world, "can_read", "user:alice", &["a", "c"] ; "exclusion keeps unbanned readers")]
#[test_case(exclusion_world, "can_read", "user:bob", &[] ; "exclusion removes banned group member")]
#[test_case(exclusion_world, "reader", "user:alice", &["a", "b", "c"] ; "base relation alone")]
#[test_case(arrow_world, "viewer", "user:alice", &["d1"] ; "arrow through userset tupleset")]
#[test_case(arrow_world, "viewer", "user:bob", &["d2"] ; "arrow through plain tupleset")]
#[test_case(cyclic_world, "viewer", "user:alice", &["x"] ; "membership cycle in data")]
#[test_case(cyclic_world, "viewer", "group:b#member", &["x"] ; "userset subject inside cycle")]
#[tokio::test]
async fn test_lookup_matches_check(
    world: fn() -> World,
    permission: &str,
    subject: &str,
    expected: &[&str],
) {
    let world = world();
    let fixture =
        TestFixture::with_world(world.namespaces, &world.tuples, DispatchConfig::default())
            .await
            .expect("Failed to create test world");

    let found = fixture
        .lookup(world.resource_type, permission, subject)
        .await
        .expect("Lookup should succeed");
    assert_eq!(found, ids(expected));

    for id in world.resource_ids {
        let membership = fixture
            .check(&format!("{}:{}", world.resource_type, id), permission, subject)
            .await
            .expect("Check should succeed");
        assert_eq!(
            membership.is_member(),
            found.contains(*id),
            "check and lookup disagree on {}:{} for {}",
            world.resource_type,
            id,
            subject
        );
    }
}

/// `group:g1` through `group:g{len}` each contain the previous one.
fn nested_groups(len: usize) -> Vec<String> {
    let mut tuples = vec!["group:g1#member@user:alice".to_owned()];
    for n in 2..=len {
        tuples.push(format!("group:g{}#member@group:g{}#member", n, n - 1));
    }
    tuples
}

fn shallow_config() -> DispatchConfig {
    DispatchConfig::builder().max_depth(5).build()
}

#[tokio::test]
async fn test_unrelated_deep_chain_does_not_fail_lookup() {
    let mut tuples = nested_groups(20);
    tuples.push("doc:d#viewer@user:alice".to_owned());
    let fixture = TestFixture::with_world(
        vec![
            user(),
            group(),
            NamespaceDefinition::new("doc").with_relation(Relation::direct("viewer")),
        ],
        &tuples,
        shallow_config(),
    )
    .await
    .expect("Failed to create test world");

    assert!(
        fixture
            .check("doc:d", "viewer", "user:alice")
            .await
            .expect("Check should succeed")
            .is_member()
    );
    let found = fixture
        .lookup("doc", "viewer", "user:alice")
        .await
        .expect("Lookup should succeed");
    assert_eq!(found, ids(&["d"]));
}

#[tokio::test]
async fn test_lookup_fails_where_check_runs_out_of_depth() {
    let mut tuples = nested_groups(20);
    tuples.push("doc:d#viewer@user:alice".to_owned());
    tuples.push("doc:deep#viewer@group:g20#member".to_owned());
    let fixture = TestFixture::with_world(
        vec![
            user(),
            group(),
            NamespaceDefinition::new("doc").with_relation(Relation::direct("viewer")),
        ],
        &tuples,
        shallow_config(),
    )
    .await
    .expect("Failed to create test world");

    let kind = |err: anyhow::Error| err.downcast_ref::<Error>().map(Error::kind);

    let check = fixture.check("doc:deep", "viewer", "user:alice").await;
    assert_eq!(check.map_err(kind).unwrap_err(), Some(ErrorKind::MaxDepthExceeded));

    let lookup = fixture.lookup("doc", "viewer", "user:alice").await;
    assert_eq!(lookup.map_err(kind).unwrap_err(), Some(ErrorKind::MaxDepthExceeded));
}
