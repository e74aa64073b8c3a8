use std::sync::Arc;
use std::time::Duration;

use devapi::{DevApiError, ObjectKind};
use pipeline::request::{CleanupRequest, GenerationRequest, Settings};
use pipeline::{spawn_cleanup, spawn_generation};
use serde_json::json;
use sessions::{Phase, SessionStore};
use test_support::FakeAdapterFactory;

fn store() -> Arc<SessionStore> {
    Arc::new(SessionStore::new(Duration::from_secs(3600)))
}

fn request() -> GenerationRequest {
    GenerationRequest {
        devorg_pat: "eyJhbGciOi.test".to_string(),
        website_url: "https://acme.test".to_string(),
        knowledgebase_url: Some("https://support.acme.test".to_string()),
        num_articles: 3,
        num_issues: 2,
        settings: Settings::default(),
    }
}

#[tokio::test(start_paused = true)]
async fn full_generation_run_provisions_the_org() {
    let store = store();
    let factory = Arc::new(FakeAdapterFactory::new());
    factory.api.set_snap_ins(vec![json!({
        "id": "snap_in/1",
        "display_id": "snap-in-1",
        "is_active": true,
        "state": "active",
        "automations": [{ "name": "auto_reply" }],
    })]);

    let session_id = store.create();
    spawn_generation(store.clone(), factory.clone(), session_id, request())
        .await
        .unwrap();

    let snapshot = store.snapshot(session_id).unwrap();
    assert!(snapshot.complete, "run should finish: {:?}", snapshot.error);
    assert_eq!(snapshot.progress, 100);
    assert_eq!(snapshot.phase, Phase::Done);

    // Seeded people and companies.
    assert_eq!(factory.api.created(ObjectKind::DevUsers).len(), 8);
    assert_eq!(factory.api.created(ObjectKind::Accounts).len(), 8);
    assert_eq!(factory.api.created(ObjectKind::RevUsers).len(), 12);

    // One capability, two features, one subfeature from the fake hierarchy.
    let parts = factory.api.created(ObjectKind::Parts);
    assert_eq!(parts.len(), 4);
    let capability = parts
        .iter()
        .find(|part| part["type"] == "capability")
        .unwrap();
    assert_eq!(capability["parent_part"], json!(["PROD-1"]));

    // Works: 2-3 tickets and exactly 2 issues per part, plus opportunities.
    let works = factory.api.created(ObjectKind::Works);
    let tickets = works.iter().filter(|w| w["type"] == "ticket").count();
    let issues = works.iter().filter(|w| w["type"] == "issue").count();
    let opportunities = works.iter().filter(|w| w["type"] == "opportunity").count();
    assert!((8..=12).contains(&tickets));
    assert_eq!(issues, 8);
    assert!(opportunities >= 8);

    // Settings: snap-in deactivated, SLA published, both crawls started.
    assert_eq!(factory.api.deactivated_snap_ins(), vec!["snap-in-1"]);
    assert_eq!(factory.api.sla_payloads().len(), 1);
    assert_eq!(
        factory.api.sla_transitions(),
        vec![("sla/1".to_string(), "published".to_string())]
    );
    assert_eq!(
        factory.api.crawls(),
        vec![
            ("https://acme.test".to_string(), 2),
            ("https://support.acme.test".to_string(), 4),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_to_success() {
    let store = store();
    let factory = Arc::new(FakeAdapterFactory::new());
    factory.api.queue_failure(
        "dev-users.create",
        DevApiError::Transient("HTTP 503".to_string()),
    );

    let session_id = store.create();
    spawn_generation(store.clone(), factory.clone(), session_id, request())
        .await
        .unwrap();

    let snapshot = store.snapshot(session_id).unwrap();
    assert!(snapshot.complete);
    assert_eq!(factory.api.created(ObjectKind::DevUsers).len(), 8);

    let log = String::from_utf8(store.log_artifact(session_id).unwrap()).unwrap();
    assert!(log.contains("retrying in 500ms"));
    assert!(log.contains("succeeded on attempt 2"));
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_moves_the_session_to_error() {
    let store = store();
    let factory = Arc::new(FakeAdapterFactory::new());
    factory.api.queue_failure(
        "dev-users.create",
        DevApiError::Permanent("HTTP 401".to_string()),
    );

    let session_id = store.create();
    spawn_generation(store.clone(), factory.clone(), session_id, request())
        .await
        .unwrap();

    let snapshot = store.snapshot(session_id).unwrap();
    assert!(!snapshot.complete);
    assert_eq!(snapshot.phase, Phase::Error);
    assert!(snapshot.error.as_deref().unwrap().contains("HTTP 401"));
    assert_ne!(snapshot.progress, 100);
}

#[tokio::test(start_paused = true)]
async fn unknown_ai_stages_are_skipped_not_fatal() {
    let store = store();
    let factory = Arc::new(FakeAdapterFactory::new());
    factory.generator.force_stage("daydreaming");

    let session_id = store.create();
    spawn_generation(store.clone(), factory.clone(), session_id, request())
        .await
        .unwrap();

    let snapshot = store.snapshot(session_id).unwrap();
    assert!(snapshot.complete, "run should finish: {:?}", snapshot.error);

    // Every ticket and issue was skipped; only opportunities were created.
    let works = factory.api.created(ObjectKind::Works);
    assert!(!works.is_empty());
    assert!(works.iter().all(|w| w["type"] == "opportunity"));

    let log = String::from_utf8(store.log_artifact(session_id).unwrap()).unwrap();
    assert!(log.contains("unknown stage `daydreaming`"));
}

#[tokio::test(start_paused = true)]
async fn cleanup_protects_the_root_part_and_the_caller() {
    let store = store();
    let factory = Arc::new(FakeAdapterFactory::new());
    factory.api.set_listing(
        ObjectKind::Parts,
        vec![
            json!({"id": "part/root", "type": "product"}),
            json!({"id": "part/2", "type": "capability"}),
        ],
    );
    factory.api.set_listing(ObjectKind::Works, vec![json!({"id": "work/1"})]);
    factory.api.set_listing(ObjectKind::RevUsers, Vec::new());
    factory.api.set_listing(ObjectKind::Accounts, Vec::new());
    factory.api.set_listing(
        ObjectKind::DevUsers,
        vec![json!({"id": "devu/1"}), json!({"id": "devu/9"})],
    );

    let session_id = store.create();
    let request = CleanupRequest {
        devorg_pat: "eyJhbGciOi.test".to_string(),
    };
    spawn_cleanup(store.clone(), factory.clone(), session_id, request)
        .await
        .unwrap();

    let snapshot = store.snapshot(session_id).unwrap();
    assert!(snapshot.complete, "cleanup should finish: {:?}", snapshot.error);

    assert_eq!(factory.api.deleted(ObjectKind::Parts), vec!["part/2"]);
    assert_eq!(factory.api.deleted(ObjectKind::Works), vec!["work/1"]);
    assert_eq!(factory.api.deleted(ObjectKind::DevUsers), vec!["devu/9"]);
}

#[tokio::test(start_paused = true)]
async fn per_object_cleanup_failures_do_not_stop_the_pass() {
    let store = store();
    let factory = Arc::new(FakeAdapterFactory::new());
    factory.api.set_listing(
        ObjectKind::Parts,
        vec![
            json!({"id": "part/2", "type": "capability"}),
            json!({"id": "part/3", "type": "feature"}),
            json!({"id": "part/4", "type": "feature"}),
        ],
    );
    factory.api.set_listing(ObjectKind::Works, Vec::new());
    factory.api.set_listing(ObjectKind::RevUsers, Vec::new());
    factory.api.set_listing(ObjectKind::Accounts, Vec::new());
    factory.api.set_listing(ObjectKind::DevUsers, Vec::new());
    // One part refuses to die, three attempts' worth.
    for _ in 0..3 {
        factory.api.queue_failure(
            "parts.delete",
            DevApiError::Transient("HTTP 500".to_string()),
        );
    }

    let session_id = store.create();
    let request = CleanupRequest {
        devorg_pat: "eyJhbGciOi.test".to_string(),
    };
    spawn_cleanup(store.clone(), factory.clone(), session_id, request)
        .await
        .unwrap();

    let snapshot = store.snapshot(session_id).unwrap();
    assert!(snapshot.complete);
    assert_eq!(factory.api.deleted(ObjectKind::Parts).len(), 2);

    let log = String::from_utf8(store.log_artifact(session_id).unwrap()).unwrap();
    assert!(log.contains("Failed to delete parts"));
}

#[tokio::test(start_paused = true)]
async fn existing_accounts_are_adopted_when_every_create_conflicts() {
    let store = store();
    let factory = Arc::new(FakeAdapterFactory::new());
    for _ in 0..8 {
        factory.api.queue_failure(
            "accounts.create",
            DevApiError::Conflict("accounts.create".to_string()),
        );
    }
    factory.api.set_listing(
        ObjectKind::RevOrgs,
        vec![json!({
            "id": "rev_org/77",
            "display_name": "Northwind Logistics",
            "account": { "id": "account/77", "display_name": "Northwind Logistics" },
        })],
    );

    let session_id = store.create();
    spawn_generation(store.clone(), factory.clone(), session_id, request())
        .await
        .unwrap();

    let snapshot = store.snapshot(session_id).unwrap();
    assert!(snapshot.complete, "run should finish: {:?}", snapshot.error);
    assert!(factory.api.created(ObjectKind::Accounts).is_empty());

    // Rev users and opportunities hang off the adopted account.
    let rev_users = factory.api.created(ObjectKind::RevUsers);
    assert!(rev_users.iter().all(|u| u["rev_org"] == "rev_org/77"));
    let works = factory.api.created(ObjectKind::Works);
    assert!(
        works
            .iter()
            .filter(|w| w["type"] == "opportunity")
            .all(|w| w["account"] == "account/77")
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_keep_separate_sessions() {
    let store = store();
    let factory = Arc::new(FakeAdapterFactory::new());

    let first = store.create();
    let second = store.create();
    let handle_a = spawn_generation(store.clone(), factory.clone(), first, request());
    let handle_b = spawn_generation(store.clone(), factory.clone(), second, request());
    let (a, b) = tokio::join!(handle_a, handle_b);
    a.unwrap();
    b.unwrap();

    assert!(store.snapshot(first).unwrap().complete);
    assert!(store.snapshot(second).unwrap().complete);
    assert_eq!(factory.api.created(ObjectKind::DevUsers).len(), 16);
}
