mod common;

use async_trait::async_trait;
use bson::oid::ObjectId;
use hyper::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use common::{call, dev_args, memory_state, seed_user, token};
use profilehub::auth::Role;
use profilehub::certifications::{aggregate_verified, CertificationWorkflow, NewCertification};
use profilehub::db::schemas::{CertificationStatus, ProfileDoc};
use profilehub::server::{AppState, StoreKind};
use profilehub::store::{MemoryProfileStore, MemoryRequestStore, ProfileStore};
use profilehub::{ProfileError, Result};

fn submission(title: &str) -> NewCertification {
    NewCertification {
        title: Some(title.into()),
        institute: Some("Ferris Institute".into()),
        start_date: Some("2024-01-10".into()),
        end_date: Some("2024-03-01".into()),
        description: Some("Coursework".into()),
        file: None,
    }
}

fn submission_json(title: &str) -> Value {
    json!({
        "title": title,
        "institute": "Ferris Institute",
        "startDate": "2024-01-10",
        "endDate": "2024-03-01",
        "description": "Coursework",
        "file": "uploads/cert.pdf"
    })
}

async fn profile_with_certs(
    store: &MemoryProfileStore,
    workflow: &CertificationWorkflow,
    titles: &[&str],
) -> (ObjectId, Vec<ObjectId>) {
    let user = store
        .insert(ProfileDoc::new("Ada", "ada", "ada@example.com"))
        .await
        .unwrap()
        .id;
    let mut profile = None;
    for title in titles {
        profile = Some(workflow.submit(&user, submission(title)).await.unwrap());
    }
    let certs: Vec<ObjectId> = profile
        .map(|p| p.certifications.iter().map(|c| c.id).collect())
        .unwrap_or_default();
    (user, certs)
}

#[tokio::test]
async fn aggregate_tracks_every_moderation_step() {
    let store = Arc::new(MemoryProfileStore::new());
    let workflow = CertificationWorkflow::new(store.clone(), 3);
    let (user, certs) = profile_with_certs(&store, &workflow, &["a", "b", "c"]).await;

    let steps: Vec<(usize, bool)> = vec![(0, true), (1, true), (2, false), (0, true), (2, false)];
    for (idx, approve) in steps {
        let profile = if approve {
            workflow.approve(&user, &certs[idx]).await.unwrap()
        } else {
            workflow.reject(&user, &certs[idx]).await.unwrap()
        };
        assert_eq!(profile.is_verified, aggregate_verified(&profile.certifications));

        let stored = store.get_by_id(&user).await.unwrap().unwrap();
        assert_eq!(stored.is_verified, aggregate_verified(&stored.certifications));
    }

    let stored = store.get_by_id(&user).await.unwrap().unwrap();
    assert!(!stored.is_verified);
}

#[tokio::test]
async fn approving_last_pending_verifies_profile() {
    let store = Arc::new(MemoryProfileStore::new());
    let workflow = CertificationWorkflow::new(store.clone(), 3);
    let (user, certs) = profile_with_certs(&store, &workflow, &["first", "second"]).await;

    let profile = workflow.approve(&user, &certs[0]).await.unwrap();
    assert_eq!(profile.certifications[0].status, CertificationStatus::Approved);
    assert_eq!(profile.certifications[1].status, CertificationStatus::Pending);
    assert!(!profile.is_verified);

    let profile = workflow.approve(&user, &certs[1]).await.unwrap();
    assert!(profile.is_verified);
}

#[tokio::test]
async fn reject_of_unknown_certification_leaves_profile_untouched() {
    let store = Arc::new(MemoryProfileStore::new());
    let workflow = CertificationWorkflow::new(store.clone(), 3);
    let (user, _) = profile_with_certs(&store, &workflow, &["only"]).await;
    let before = store.get_by_id(&user).await.unwrap().unwrap();

    let err = workflow.reject(&user, &ObjectId::new()).await.unwrap_err();
    assert!(matches!(err, ProfileError::NotFound(_)));

    let after = store.get_by_id(&user).await.unwrap().unwrap();
    assert_eq!(after.version, before.version);
    assert_eq!(after.certifications, before.certifications);

    let err = workflow.reject(&ObjectId::new(), &ObjectId::new()).await.unwrap_err();
    assert!(matches!(err, ProfileError::NotFound(_)));
}

#[tokio::test]
async fn approving_twice_is_idempotent() {
    let store = Arc::new(MemoryProfileStore::new());
    let workflow = CertificationWorkflow::new(store.clone(), 3);
    let (user, certs) = profile_with_certs(&store, &workflow, &["once"]).await;

    let first = assert_ok!(workflow.approve(&user, &certs[0]).await);
    let second = assert_ok!(workflow.approve(&user, &certs[0]).await);

    for profile in [&first, &second] {
        assert_eq!(profile.certifications[0].status, CertificationStatus::Approved);
        assert!(profile.certifications[0].is_verified);
        assert!(profile.is_verified);
    }
    assert_err!(workflow.reject(&user, &certs[0]).await);
}

/// Store that lets another moderator write first, exactly once, whenever a
/// save is attempted.
struct RacingStore {
    inner: Arc<MemoryProfileStore>,
    rival: std::sync::Mutex<Option<(ObjectId, ObjectId)>>,
    saves: AtomicUsize,
}

#[async_trait]
impl ProfileStore for RacingStore {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<ProfileDoc>> {
        self.inner.get_by_id(id).await
    }

    async fn find_candidates(&self, exclude: &[ObjectId], limit: usize) -> Result<Vec<ProfileDoc>> {
        self.inner.find_candidates(exclude, limit).await
    }

    async fn find_with_pending_certifications(&self) -> Result<Vec<ProfileDoc>> {
        self.inner.find_with_pending_certifications().await
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<ProfileDoc>> {
        self.inner.find_by_role(role).await
    }

    async fn insert(&self, profile: ProfileDoc) -> Result<ProfileDoc> {
        self.inner.insert(profile).await
    }

    async fn save(&self, profile: &ProfileDoc) -> Result<ProfileDoc> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let rival = self.rival.lock().unwrap().take();
        if let Some((user, cert)) = rival {
            let rival_workflow = CertificationWorkflow::new(self.inner.clone(), 3);
            rival_workflow.approve(&user, &cert).await?;
        }
        self.inner.save(profile).await
    }

    async fn add_connection(&self, user: &ObjectId, other: &ObjectId) -> Result<()> {
        self.inner.add_connection(user, other).await
    }
}

#[tokio::test]
async fn interleaved_approvals_both_land() {
    let inner = Arc::new(MemoryProfileStore::new());
    let seeding = CertificationWorkflow::new(inner.clone(), 3);
    let (user, certs) = profile_with_certs(&inner, &seeding, &["left", "right"]).await;

    let racing = Arc::new(RacingStore {
        inner: inner.clone(),
        rival: std::sync::Mutex::new(Some((user, certs[1]))),
        saves: AtomicUsize::new(0),
    });
    let workflow = CertificationWorkflow::new(racing.clone(), 3);

    let profile = workflow.approve(&user, &certs[0]).await.unwrap();

    // first save lost to the rival, second one landed on the fresh copy
    assert_eq!(racing.saves.load(Ordering::SeqCst), 2);
    assert!(profile.certifications.iter().all(|c| c.is_verified));
    assert!(profile.is_verified);

    let stored = inner.get_by_id(&user).await.unwrap().unwrap();
    assert!(stored.is_verified);
    assert_eq!(stored.version, profile.version);
}

#[tokio::test]
async fn concurrent_approvals_on_one_profile() {
    let store = Arc::new(MemoryProfileStore::new());
    let workflow = CertificationWorkflow::new(store.clone(), 3);
    let (user, certs) = profile_with_certs(&store, &workflow, &["a", "b", "c"]).await;

    let results = futures::future::join_all(
        certs.iter().map(|cert| workflow.approve(&user, cert)),
    )
    .await;
    for result in results {
        assert_ok!(result);
    }

    let stored = store.get_by_id(&user).await.unwrap().unwrap();
    assert!(stored
        .certifications
        .iter()
        .all(|c| c.status == CertificationStatus::Approved));
    assert!(stored.is_verified);
}

/// Store whose saves always lose the version race
struct AlwaysStale {
    inner: Arc<MemoryProfileStore>,
    saves: AtomicUsize,
}

#[async_trait]
impl ProfileStore for AlwaysStale {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<ProfileDoc>> {
        self.inner.get_by_id(id).await
    }

    async fn find_candidates(&self, exclude: &[ObjectId], limit: usize) -> Result<Vec<ProfileDoc>> {
        self.inner.find_candidates(exclude, limit).await
    }

    async fn find_with_pending_certifications(&self) -> Result<Vec<ProfileDoc>> {
        self.inner.find_with_pending_certifications().await
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<ProfileDoc>> {
        self.inner.find_by_role(role).await
    }

    async fn insert(&self, profile: ProfileDoc) -> Result<ProfileDoc> {
        self.inner.insert(profile).await
    }

    async fn save(&self, _profile: &ProfileDoc) -> Result<ProfileDoc> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Err(ProfileError::Conflict("stale".into()))
    }

    async fn add_connection(&self, user: &ObjectId, other: &ObjectId) -> Result<()> {
        self.inner.add_connection(user, other).await
    }
}

#[tokio::test]
async fn exhausted_retries_surface_conflict() {
    let inner = Arc::new(MemoryProfileStore::new());
    let seeding = CertificationWorkflow::new(inner.clone(), 3);
    let (user, certs) = profile_with_certs(&inner, &seeding, &["a"]).await;

    let stale = Arc::new(AlwaysStale {
        inner: inner.clone(),
        saves: AtomicUsize::new(0),
    });
    let workflow = CertificationWorkflow::new(stale.clone(), 2);

    let err = workflow.approve(&user, &certs[0]).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(stale.saves.load(Ordering::SeqCst), 3);
}

/// Store that is down
struct FailingStore {
    called: AtomicBool,
}

#[async_trait]
impl ProfileStore for FailingStore {
    async fn get_by_id(&self, _id: &ObjectId) -> Result<Option<ProfileDoc>> {
        self.called.store(true, Ordering::SeqCst);
        Err(ProfileError::Database("connection reset".into()))
    }

    async fn find_candidates(&self, _exclude: &[ObjectId], _limit: usize) -> Result<Vec<ProfileDoc>> {
        Err(ProfileError::Database("connection reset".into()))
    }

    async fn find_with_pending_certifications(&self) -> Result<Vec<ProfileDoc>> {
        Err(ProfileError::Database("connection reset".into()))
    }

    async fn find_by_role(&self, _role: Role) -> Result<Vec<ProfileDoc>> {
        Err(ProfileError::Database("connection reset".into()))
    }

    async fn insert(&self, _profile: ProfileDoc) -> Result<ProfileDoc> {
        Err(ProfileError::Database("connection reset".into()))
    }

    async fn save(&self, _profile: &ProfileDoc) -> Result<ProfileDoc> {
        Err(ProfileError::Database("connection reset".into()))
    }

    async fn add_connection(&self, _user: &ObjectId, _other: &ObjectId) -> Result<()> {
        Err(ProfileError::Database("connection reset".into()))
    }
}

#[tokio::test]
async fn store_failures_propagate_as_server_errors() {
    let failing = Arc::new(FailingStore {
        called: AtomicBool::new(false),
    });
    let state = Arc::new(
        AppState::new(
            dev_args(),
            StoreKind::Memory,
            failing.clone(),
            Arc::new(MemoryRequestStore::new()),
        )
        .unwrap(),
    );

    let err = state
        .certifications
        .approve(&ObjectId::new(), &ObjectId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::Database(_)));
    assert!(failing.called.load(Ordering::SeqCst));

    let viewer = ObjectId::new();
    let tv = token(&state, &viewer, Role::User);
    let (status, body) = call(&state, Method::GET, "/connections/suggested", Some(&tv), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Server error");
    assert_eq!(body["code"], "DB_ERROR");
}

// =============================================================================
// HTTP surface
// =============================================================================

#[tokio::test]
async fn submit_then_moderate_over_http() {
    let state = memory_state();
    let owner = seed_user(&state, "owner").await;
    let admin = seed_user(&state, "admin").await;
    let to = token(&state, &owner, Role::User);
    let ta = token(&state, &admin, Role::Admin);

    let (status, body) = call(
        &state,
        Method::POST,
        "/users/certifications",
        Some(&to),
        Some(submission_json("Rust")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"][0]["status"], "pending");
    assert_eq!(body["data"][0]["isVerified"], false);
    let cert_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &state,
        Method::GET,
        "/admin/certifications/pending",
        Some(&ta),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], owner.to_hex());
    assert_eq!(body["data"][0]["certifications"][0]["id"], cert_id.as_str());

    let (status, body) = call(
        &state,
        Method::PUT,
        &format!("/admin/certifications/{}/{}/approve", owner.to_hex(), cert_id),
        Some(&ta),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["isVerified"], true);
    assert_eq!(body["data"]["certifications"][0]["status"], "approved");

    let (_, body) = call(
        &state,
        Method::GET,
        "/admin/certifications/pending",
        Some(&ta),
        None,
    )
    .await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn moderation_requires_admin() {
    let state = memory_state();
    let owner = seed_user(&state, "owner").await;
    let to = token(&state, &owner, Role::User);

    let (_, body) = call(
        &state,
        Method::POST,
        "/users/certifications",
        Some(&to),
        Some(submission_json("Rust")),
    )
    .await;
    let cert_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &state,
        Method::PUT,
        &format!("/certifications/{}/{}/approve", owner.to_hex(), cert_id),
        Some(&to),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = call(&state, Method::GET, "/admin/certifications/pending", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn alias_paths_and_missing_ids() {
    let state = memory_state();
    let owner = seed_user(&state, "owner").await;
    let admin = seed_user(&state, "admin").await;
    let to = token(&state, &owner, Role::User);
    let ta = token(&state, &admin, Role::Admin);

    let (_, body) = call(
        &state,
        Method::POST,
        "/users/certifications",
        Some(&to),
        Some(submission_json("Rust")),
    )
    .await;
    let cert_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &state,
        Method::PUT,
        &format!("/certifications/{}/{}/reject", owner.to_hex(), cert_id),
        Some(&ta),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["certifications"][0]["status"], "rejected");
    assert_eq!(body["data"]["isVerified"], false);

    let (status, _) = call(
        &state,
        Method::PUT,
        &format!("/certifications/{}/{}/approve", owner.to_hex(), cert_id),
        Some(&ta),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &state,
        Method::PUT,
        &format!(
            "/certifications/{}/{}/reject",
            owner.to_hex(),
            ObjectId::new().to_hex()
        ),
        Some(&ta),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = call(
        &state,
        Method::PUT,
        &format!("/certifications/not-an-id/{}/reject", cert_id),
        Some(&ta),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submission_and_edit_validation() {
    let state = memory_state();
    let owner = seed_user(&state, "owner").await;
    let to = token(&state, &owner, Role::User);

    let (status, body) = call(
        &state,
        Method::POST,
        "/users/certifications",
        Some(&to),
        Some(json!({ "title": "Rust" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, body) = call(
        &state,
        Method::POST,
        "/users/certifications",
        Some(&to),
        Some(submission_json("Rust")),
    )
    .await;
    let cert_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &state,
        Method::PUT,
        &format!("/users/certifications/{}", cert_id),
        Some(&to),
        Some(json!({ "status": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = call(
        &state,
        Method::PUT,
        &format!("/users/certifications/{}", cert_id),
        Some(&to),
        Some(json!({ "title": "Rust in Practice", "institute": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["title"], "Rust in Practice");
    assert_eq!(body["data"][0]["institute"], "Ferris Institute");
    assert_eq!(body["data"][0]["status"], "pending");

    let (status, _) = call(
        &state,
        Method::PUT,
        &format!("/users/certifications/{}", ObjectId::new().to_hex()),
        Some(&to),
        Some(json!({ "title": "Elsewhere" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
