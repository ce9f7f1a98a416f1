use std::sync::Arc;

use axum::http::header::COOKIE;
use axum::Router;

use agora_api::auth::session::SessionManager;
use agora_api::config::Config;
use agora_api::db::pool::DbPool;
use agora_api::AppState;

/// Build a test AppState against the `_test` database.
pub async fn test_state() -> AppState {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);

    let mut config = Config::from_env();
    config.database_url = with_test_db_suffix(&config.database_url);

    let db = agora_api::db::pool::connect(&config.database_url).await;
    let sessions = SessionManager::new(db.clone(), config.session_ttl_hours);

    AppState {
        db,
        sessions,
        config: Arc::new(config),
    }
}

fn with_test_db_suffix(database_url: &str) -> String {
    let mut parts = database_url.splitn(2, '?');
    let base = parts.next().unwrap_or(database_url);
    let query = parts.next();

    let mut base_parts = base.rsplitn(2, '/');
    let db_name = base_parts.next().unwrap_or("");
    let prefix = base_parts.next().unwrap_or("");

    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    let mut updated = format!("{}/{}", prefix, format!("{db_name}_test"));
    if let Some(query) = query {
        updated.push('?');
        updated.push_str(query);
    }
    updated
}

/// Build the full application router wired to the test state.
pub async fn test_app() -> (Router, AppState) {
    let state = test_state().await;
    let app = agora_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Generate a unique username that fits the 32-character limit.
pub fn unique_username(tag: &str) -> String {
    let suffix = agora_common::id::prefixed_ulid(tag);
    suffix.replace('_', ".").chars().take(32).collect()
}

/// Register a user and log them in. Returns the user id and the raw
/// session token from the `session_id` cookie.
pub async fn register_and_login(
    server: &axum_test::TestServer,
    username: &str,
) -> (String, String) {
    let email = format!("{}@example.com", username.to_lowercase());

    let resp = server
        .post("/api/v1/auth/register")
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": "test-password-123",
        }))
        .await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    let user_id = resp.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .post("/api/v1/auth/login")
        .json(&serde_json::json!({
            "email": email,
            "password": "test-password-123",
        }))
        .await;
    resp.assert_status_ok();
    let token = resp.cookie("session_id").value().to_string();

    (user_id, token)
}

/// Format the `Cookie` request header for a session token.
pub fn session_cookie(token: &str) -> (axum::http::HeaderName, String) {
    (COOKIE, format!("session_id={token}"))
}

/// Create a post as the given session. Returns the post id.
pub async fn create_test_post(
    server: &axum_test::TestServer,
    token: &str,
    title: &str,
) -> String {
    let (name, value) = session_cookie(token);
    let resp = server
        .post("/api/v1/posts")
        .add_header(name, value)
        .json(&serde_json::json!({
            "title": title,
            "content": "test post content",
        }))
        .await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    resp.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Delete a test user (CASCADE removes their sessions, posts, comments,
/// and likes).
pub async fn cleanup_user(db: &DbPool, user_id: &str) {
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    let mut conn = db.get().await.expect("pool");
    diesel::delete(
        agora_api::db::schema::users::table
            .filter(agora_api::db::schema::users::id.eq(user_id)),
    )
    .execute(&mut conn)
    .await
    .ok();
}

/// Delete a test category.
pub async fn cleanup_category(db: &DbPool, category_id: &str) {
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    let mut conn = db.get().await.expect("pool");
    diesel::delete(
        agora_api::db::schema::categories::table
            .filter(agora_api::db::schema::categories::id.eq(category_id)),
    )
    .execute(&mut conn)
    .await
    .ok();
}

/// Shift a session's `created_at` into the past, for expiry tests.
pub async fn backdate_session(db: &DbPool, token: &str, hours: i64) {
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    let mut conn = db.get().await.expect("pool");
    let new_created = chrono::Utc::now() - chrono::Duration::hours(hours);
    diesel::update(
        agora_api::db::schema::sessions::table
            .filter(agora_api::db::schema::sessions::id.eq(token)),
    )
    .set(agora_api::db::schema::sessions::created_at.eq(new_created))
    .execute(&mut conn)
    .await
    .expect("backdate session");
}
