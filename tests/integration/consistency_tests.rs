//! Consistency, revision and cache integration tests.

use std::time::Duration;

use inferadb_graph::datastore::{Datastore, TupleUpdate};
use inferadb_graph::dispatch::Membership;
use inferadb_graph::service::CheckPermissionRequest;
use inferadb_graph::testing::standard_namespaces;
use inferadb_graph::{
    ConsistencyRequirement, ConsistencyToken, DatastoreConfig, ErrorKind, ObjectRef, Relation,
    Revision, SubjectRef,
};
use proptest::prelude::*;

use crate::common::TestFixture;

fn masterplan_viewer(
    subject: &str,
    consistency: ConsistencyRequirement,
) -> CheckPermissionRequest {
    CheckPermissionRequest::builder()
        .resource(ObjectRef::new("document", "masterplan"))
        .permission("viewer")
        .subject(SubjectRef::object("user", subject))
        .consistency(consistency)
        .build()
}

#[tokio::test]
async fn test_at_least_as_fresh_never_goes_back_under_fuzzing() {
    let fixture = TestFixture::with_fuzzing(Duration::from_secs(1))
        .await
        .expect("Failed to create test fixture");
    let written = fixture
        .store
        .write_tuples(vec![TupleUpdate::create(
            "document:masterplan#viewer@user:newhire".parse().unwrap(),
        )])
        .await
        .unwrap();

    for _ in 0..20 {
        let response = fixture
            .service
            .check_permission(masterplan_viewer(
                "newhire",
                ConsistencyRequirement::AtLeastAsFresh(written.into()),
            ))
            .await
            .unwrap();
        assert_eq!(response.membership, Membership::Member);
        assert!(response.checked_at.revision().unwrap() >= written);
    }
}

#[tokio::test]
async fn test_eventual_stays_within_fuzzing_window() {
    let fuzzing = Duration::from_secs(1);
    let fixture = TestFixture::with_fuzzing(fuzzing)
        .await
        .expect("Failed to create test fixture");

    let window = u64::try_from(fuzzing.as_nanos()).unwrap_or(u64::MAX);
    for _ in 0..20 {
        let head = fixture.store.head_revision().await.unwrap();
        let response = fixture
            .service
            .check_permission(masterplan_viewer("eng_lead", ConsistencyRequirement::Eventual))
            .await
            .unwrap();
        let checked_at = response.checked_at.revision().unwrap();
        assert!(checked_at >= head.saturating_sub(window));
    }
}

#[tokio::test]
async fn test_deleted_tuple_visible_at_old_snapshot() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let deleted = fixture
        .store
        .write_tuples(vec![TupleUpdate::delete(
            "document:masterplan#viewer@user:eng_lead".parse().unwrap(),
        )])
        .await
        .unwrap();
    assert!(deleted > fixture.revision);

    let before = fixture
        .service
        .check_permission(masterplan_viewer(
            "eng_lead",
            ConsistencyRequirement::AtExactSnapshot(fixture.revision.into()),
        ))
        .await
        .unwrap();
    assert_eq!(before.membership, Membership::Member);
    assert_eq!(before.checked_at.revision().unwrap(), fixture.revision);

    let after = fixture
        .service
        .check_permission(masterplan_viewer(
            "eng_lead",
            ConsistencyRequirement::AtLeastAsFresh(deleted.into()),
        ))
        .await
        .unwrap();
    assert_eq!(after.membership, Membership::NotMember);

    let full = fixture
        .service
        .check_permission(masterplan_viewer("eng_lead", ConsistencyRequirement::Full))
        .await
        .unwrap();
    assert_eq!(full.membership, Membership::NotMember);
}

#[tokio::test]
async fn test_snapshot_outside_gc_window() {
    let fixture = TestFixture::with_datastore_config(
        DatastoreConfig::builder()
            .gc_window(Duration::from_millis(50))
            .build(),
    )
    .await
    .expect("Failed to create test fixture");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = fixture
        .service
        .check_permission(masterplan_viewer(
            "eng_lead",
            ConsistencyRequirement::AtExactSnapshot(fixture.revision.into()),
        ))
        .await
        .expect_err("Snapshot should have been collected");
    assert_eq!(err.kind(), ErrorKind::RevisionTooOld);

    // Fresher requirements are still served.
    let response = fixture
        .service
        .check_permission(masterplan_viewer(
            "eng_lead",
            ConsistencyRequirement::AtLeastAsFresh(fixture.revision.into()),
        ))
        .await
        .unwrap();
    assert!(response.membership.is_member());
}

#[tokio::test]
async fn test_snapshot_in_the_future() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let err = fixture
        .service
        .check_permission(masterplan_viewer(
            "eng_lead",
            ConsistencyRequirement::AtExactSnapshot(Revision::new(u64::MAX).into()),
        ))
        .await
        .expect_err("Revision is past the head");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_malformed_token() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let err = fixture
        .service
        .check_permission(masterplan_viewer(
            "eng_lead",
            ConsistencyRequirement::AtLeastAsFresh(ConsistencyToken::new("not-a-token")),
        ))
        .await
        .expect_err("Token cannot be decoded");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test(start_paused = true)]
async fn test_schema_change_visible_after_cache_ttl() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let commenter = |subject: &str| {
        CheckPermissionRequest::builder()
            .resource(ObjectRef::new("document", "masterplan"))
            .permission("commenter")
            .subject(SubjectRef::object("user", subject))
            .consistency(ConsistencyRequirement::Full)
            .build()
    };

    let err = fixture
        .service
        .check_permission(commenter("eng_lead"))
        .await
        .expect_err("Relation does not exist yet");
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);

    let document = standard_namespaces()
        .into_iter()
        .find(|namespace| namespace.name == "document")
        .unwrap()
        .with_relation(Relation::direct("commenter"));
    fixture.store.write_namespace(document).await.unwrap();
    fixture
        .store
        .write_tuples(vec![TupleUpdate::touch(
            "document:masterplan#commenter@user:eng_lead".parse().unwrap(),
        )])
        .await
        .unwrap();

    // The cached definition is still served.
    let err = fixture
        .service
        .check_permission(commenter("eng_lead"))
        .await
        .expect_err("Cached definition predates the relation");
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);

    let ttl = fixture.service.namespaces().config().ttl;
    tokio::time::advance(ttl + Duration::from_secs(1)).await;

    let response = fixture
        .service
        .check_permission(commenter("eng_lead"))
        .await
        .expect("Refreshed definition has the relation");
    assert_eq!(response.membership, Membership::Member);
}

#[tokio::test]
async fn test_cold_and_warm_cache_agree() {
    let fixture = TestFixture::create().await.expect("Failed to create test fixture");
    let subjects = ["eng_lead", "legal", "auditor", "villain", "unknowngal"];

    let mut cold = Vec::new();
    for subject in subjects {
        fixture.service.namespaces().clear();
        cold.push(
            fixture
                .check("document:masterplan", "viewer", &format!("user:{}", subject))
                .await
                .unwrap(),
        );
    }

    let mut warm = Vec::new();
    for subject in subjects {
        warm.push(
            fixture
                .check("document:masterplan", "viewer", &format!("user:{}", subject))
                .await
                .unwrap(),
        );
    }
    assert_eq!(cold, warm);
    assert!(fixture.service.namespaces().stats().hits > 0);
}

proptest! {
    #[test]
    fn test_tokens_order_like_revisions(a in any::<u64>(), b in any::<u64>()) {
        let token_a = ConsistencyToken::from_revision(Revision::new(a));
        let token_b = ConsistencyToken::from_revision(Revision::new(b));
        prop_assert_eq!(token_a.partial_cmp(&token_b), Some(a.cmp(&b)));
        prop_assert_eq!(token_a.value().parse::<ConsistencyToken>().unwrap(), token_a.clone());
        prop_assert_eq!(token_a.revision().unwrap(), Revision::new(a));
    }
}
