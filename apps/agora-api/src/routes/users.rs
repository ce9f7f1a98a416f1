use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::auth::middleware::AuthUser;
use crate::db::schema::users;
use crate::error::ApiError;
use crate::models::user::{PublicUserResponse, User, UserResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/@me", get(get_me))
        .route("/users/{user_id}", get(get_user))
}

/// `GET /api/v1/users/@me` — Return the current user's full profile.
async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let user: User = users::table
        .find(&auth.user_id)
        .select(User::as_select())
        .first(&mut conn)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(UserResponse::from(user)))
}

/// `GET /api/v1/users/{user_id}` — Return a user's public profile.
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicUserResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let user: User = users::table
        .find(&user_id)
        .select(User::as_select())
        .first(&mut conn)
        .await
        .optional()
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(PublicUserResponse::from(user)))
}
