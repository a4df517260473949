mod common;

use bson::oid::ObjectId;
use hyper::{Method, StatusCode};

use common::{call, memory_state, seed_user, token};
use profilehub::auth::Role;
use profilehub::db::schemas::ProfileDoc;

#[tokio::test]
async fn admin_promotes_member_to_head() {
    let state = memory_state();
    let member = seed_user(&state, "ada").await;
    let admin = token(&state, &ObjectId::new(), Role::Admin);

    let (status, body) = call(
        &state,
        Method::PUT,
        &format!("/admin/users/{}/assign-head", member.to_hex()),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "User assigned as head user");
    assert_eq!(body["data"]["userType"], "head");
    assert_eq!(body["data"]["role"], "user");

    let stored = state.profiles.get_by_id(&member).await.unwrap().unwrap();
    assert_eq!(stored.user_type, profilehub::db::schemas::UserType::Head);
}

#[tokio::test]
async fn only_user_accounts_can_become_head() {
    let state = memory_state();
    let mut root = ProfileDoc::new("Root", "root", "root@example.com");
    root.role = Role::Admin;
    let root_id = state.profiles.insert(root).await.unwrap().id;
    let admin = token(&state, &root_id, Role::Admin);

    let (status, body) = call(
        &state,
        Method::PUT,
        &format!("/admin/users/{}/assign-head", root_id.to_hex()),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn assign_head_needs_admin_and_known_user() {
    let state = memory_state();
    let member = seed_user(&state, "ada").await;
    let admin = token(&state, &ObjectId::new(), Role::Admin);
    let user = token(&state, &member, Role::User);
    let uri = format!("/admin/users/{}/assign-head", member.to_hex());

    let (status, _) = call(&state, Method::PUT, &uri, Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&state, Method::PUT, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &state,
        Method::PUT,
        &format!("/admin/users/{}/assign-head", ObjectId::new().to_hex()),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &state,
        Method::PUT,
        "/admin/users/not-an-id/assign-head",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn member_listing_skips_admins() {
    let state = memory_state();
    let admin = token(&state, &ObjectId::new(), Role::Admin);

    let (status, body) = call(&state, Method::GET, "/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let ada = seed_user(&state, "ada").await;
    let mut root = ProfileDoc::new("Root", "root", "root@example.com");
    root.role = Role::Admin;
    state.profiles.insert(root).await.unwrap();

    let (status, body) = call(&state, Method::GET, "/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let members = body["data"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["id"], ada.to_hex());
    assert_eq!(members[0]["userType"], "regular");
}
