mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use agora_api::db::schema::comments;
use agora_api::models::comment::NewComment;

async fn post_comment(
    server: &TestServer,
    token: &str,
    post_id: &str,
    content: &str,
    parent_id: Option<&str>,
) -> serde_json::Value {
    let (name, value) = common::session_cookie(token);
    let resp = server
        .post(&format!("/api/v1/posts/{post_id}/comments"))
        .add_header(name, value)
        .json(&serde_json::json!({
            "content": content,
            "parent_id": parent_id,
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    resp.json()
}

// ---------------------------------------------------------------------------
// POST /api/v1/posts/{post_id}/comments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_comment_requires_auth() {
    let (app, state) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let username = common::unique_username("cna");
    let (user_id, token) = common::register_and_login(&server, &username).await;
    let post_id = common::create_test_post(&server, &token, "auth check post").await;

    let resp = server
        .post(&format!("/api/v1/posts/{post_id}/comments"))
        .json(&serde_json::json!({ "content": "anonymous" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    common::cleanup_user(&state.db, &user_id).await;
}

#[tokio::test]
async fn reply_to_missing_parent_is_404() {
    let (app, state) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let username = common::unique_username("cnp");
    let (user_id, token) = common::register_and_login(&server, &username).await;
    let post_id = common::create_test_post(&server, &token, "reply target post").await;

    let (name, value) = common::session_cookie(&token);
    let resp = server
        .post(&format!("/api/v1/posts/{post_id}/comments"))
        .add_header(name, value)
        .json(&serde_json::json!({
            "content": "reply to nothing",
            "parent_id": "cmt_00000000000000000000000000",
        }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    common::cleanup_user(&state.db, &user_id).await;
}

#[tokio::test]
async fn reply_cannot_target_comment_of_other_post() {
    let (app, state) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let username = common::unique_username("cxp");
    let (user_id, token) = common::register_and_login(&server, &username).await;
    let post_a = common::create_test_post(&server, &token, "post a").await;
    let post_b = common::create_test_post(&server, &token, "post b").await;

    let root = post_comment(&server, &token, &post_a, "root on a", None).await;
    let root_id = root["id"].as_str().unwrap();

    // Replying under post B to a comment that lives on post A must fail.
    let (name, value) = common::session_cookie(&token);
    let resp = server
        .post(&format!("/api/v1/posts/{post_b}/comments"))
        .add_header(name, value)
        .json(&serde_json::json!({
            "content": "cross-post reply",
            "parent_id": root_id,
        }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    common::cleanup_user(&state.db, &user_id).await;
}

// ---------------------------------------------------------------------------
// GET /api/v1/posts/{post_id}/comments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn comments_are_returned_as_ordered_tree() {
    let (app, state) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let username = common::unique_username("ctr");
    let (user_id, token) = common::register_and_login(&server, &username).await;
    let post_id = common::create_test_post(&server, &token, "threaded post").await;

    let c1 = post_comment(&server, &token, &post_id, "first root", None).await;
    let c1_id = c1["id"].as_str().unwrap().to_string();
    let _c2 = post_comment(&server, &token, &post_id, "first reply", Some(&c1_id)).await;
    let c3 = post_comment(&server, &token, &post_id, "second root", None).await;
    let _c4 = post_comment(&server, &token, &post_id, "second reply", Some(&c1_id)).await;

    let resp = server
        .get(&format!("/api/v1/posts/{post_id}/comments"))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let data = body["data"].as_array().unwrap();

    // Root order preserved; both replies under the first root, in order.
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], c1["id"]);
    assert_eq!(data[1]["id"], c3["id"]);
    let replies = data[0]["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["content"], "first reply");
    assert_eq!(replies[1]["content"], "second reply");
    assert!(data[1]["replies"].as_array().unwrap().is_empty());

    // Nodes carry author info for rendering.
    assert_eq!(data[0]["username"], serde_json::json!(username));

    common::cleanup_user(&state.db, &user_id).await;
}

#[tokio::test]
async fn orphaned_reply_is_omitted_from_tree() {
    let (app, state) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let username = common::unique_username("cor");
    let (user_id, token) = common::register_and_login(&server, &username).await;
    let post_id = common::create_test_post(&server, &token, "orphan post").await;

    let _root = post_comment(&server, &token, &post_id, "visible root", None).await;

    // Insert a reply whose parent was deleted out from under it.
    let orphan_id = agora_common::id::prefixed_ulid("cmt");
    let mut conn = state.db.get().await.expect("pool");
    diesel::insert_into(comments::table)
        .values(NewComment {
            id: &orphan_id,
            user_id: &user_id,
            post_id: &post_id,
            parent_id: Some("cmt_00000000000000000000000000"),
            content: "orphaned reply",
            created_at: Utc::now(),
        })
        .execute(&mut conn)
        .await
        .expect("insert orphan");

    let resp = server
        .get(&format!("/api/v1/posts/{post_id}/comments"))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let data = body["data"].as_array().unwrap();

    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["content"], "visible root");
    assert!(data[0]["replies"].as_array().unwrap().is_empty());

    common::cleanup_user(&state.db, &user_id).await;
}

#[tokio::test]
async fn comments_for_missing_post_is_404() {
    let (app, _state) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let resp = server
        .get("/api/v1/posts/post_00000000000000000000000000/comments")
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/comments/{comment_id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_the_author_can_delete_a_comment() {
    let (app, state) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let author_name = common::unique_username("cda");
    let (author_id, author_token) = common::register_and_login(&server, &author_name).await;
    let post_id = common::create_test_post(&server, &author_token, "deletable").await;
    let comment = post_comment(&server, &author_token, &post_id, "mine", None).await;
    let comment_id = comment["id"].as_str().unwrap();

    let other_name = common::unique_username("cdo");
    let (other_id, other_token) = common::register_and_login(&server, &other_name).await;

    // A stranger is rejected.
    let (name, value) = common::session_cookie(&other_token);
    let resp = server
        .delete(&format!("/api/v1/comments/{comment_id}"))
        .add_header(name, value)
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);

    // The author succeeds.
    let (name, value) = common::session_cookie(&author_token);
    let resp = server
        .delete(&format!("/api/v1/comments/{comment_id}"))
        .add_header(name, value)
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    common::cleanup_user(&state.db, &author_id).await;
    common::cleanup_user(&state.db, &other_id).await;
}
