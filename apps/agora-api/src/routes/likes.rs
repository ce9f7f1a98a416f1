//! Like/dislike toggling and reaction counts for posts and comments.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{comments, likes, posts};
use crate::error::ApiError;
use crate::models::like::{Like, NewLike};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/likes/toggle", post(toggle_like))
        .route("/likes", get(get_reactions))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    fn is_like(self) -> bool {
        matches!(self, ReactionKind::Like)
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/likes/toggle
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleLikeRequest {
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub kind: ReactionKind,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleLikeResponse {
    pub status: &'static str,
}

async fn toggle_like(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<ToggleLikeRequest>,
) -> Result<Json<ToggleLikeResponse>, ApiError> {
    // Exactly one target.
    let target = match (body.post_id.as_deref(), body.comment_id.as_deref()) {
        (Some(post_id), None) => Target::Post(post_id.to_string()),
        (None, Some(comment_id)) => Target::Comment(comment_id.to_string()),
        _ => {
            return Err(ApiError::bad_request(
                "Provide either post_id or comment_id, but not both",
            ))
        }
    };

    let mut conn = state.db.get().await?;

    // Check the target exists before touching the likes table.
    match &target {
        Target::Post(id) => {
            posts::table
                .find(id)
                .select(posts::id)
                .first::<String>(&mut conn)
                .await
                .optional()?
                .ok_or_else(|| ApiError::not_found("Post not found"))?;
        }
        Target::Comment(id) => {
            comments::table
                .find(id)
                .select(comments::id)
                .first::<String>(&mut conn)
                .await
                .optional()?
                .ok_or_else(|| ApiError::not_found("Comment not found"))?;
        }
    }

    let want = body.kind.is_like();

    // Check-then-act runs in one transaction holding a row lock, so two
    // concurrent toggles from the same user serialize instead of racing.
    let status = conn
        .transaction::<&'static str, diesel::result::Error, _>(move |conn| {
            async move {
                let existing: Option<Like> = match &target {
                    Target::Post(id) => {
                        likes::table
                            .filter(likes::user_id.eq(&user_id))
                            .filter(likes::post_id.eq(id))
                            .for_update()
                            .select(Like::as_select())
                            .first(conn)
                            .await
                            .optional()?
                    }
                    Target::Comment(id) => {
                        likes::table
                            .filter(likes::user_id.eq(&user_id))
                            .filter(likes::comment_id.eq(id))
                            .for_update()
                            .select(Like::as_select())
                            .first(conn)
                            .await
                            .optional()?
                    }
                };

                match existing {
                    // Same reaction again: toggle it off.
                    Some(like) if like.is_like == want => {
                        diesel::delete(likes::table.find(&like.id))
                            .execute(conn)
                            .await?;
                        Ok("removed")
                    }
                    // Opposite reaction: switch it in place.
                    Some(like) => {
                        diesel::update(likes::table.find(&like.id))
                            .set(likes::is_like.eq(want))
                            .execute(conn)
                            .await?;
                        Ok("switched")
                    }
                    None => {
                        let id =
                            agora_common::id::prefixed_ulid(agora_common::id::prefix::LIKE);
                        let (post_id, comment_id) = match &target {
                            Target::Post(id) => (Some(id.as_str()), None),
                            Target::Comment(id) => (None, Some(id.as_str())),
                        };

                        diesel::insert_into(likes::table)
                            .values(NewLike {
                                id: &id,
                                user_id: &user_id,
                                post_id,
                                comment_id,
                                is_like: want,
                                created_at: Utc::now(),
                            })
                            .execute(conn)
                            .await?;
                        Ok("added")
                    }
                }
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(ToggleLikeResponse { status }))
}

#[derive(Debug, Clone)]
enum Target {
    Post(String),
    Comment(String),
}

// ---------------------------------------------------------------------------
// GET /api/v1/likes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReactionsParams {
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReactionsResponse {
    pub likes: i64,
    pub dislikes: i64,
}

async fn get_reactions(
    State(state): State<AppState>,
    Query(params): Query<ReactionsParams>,
) -> Result<Json<ReactionsResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let rows: Vec<bool> = match (params.post_id.as_deref(), params.comment_id.as_deref()) {
        (Some(post_id), None) => {
            likes::table
                .filter(likes::post_id.eq(post_id))
                .select(likes::is_like)
                .load(&mut conn)
                .await?
        }
        (None, Some(comment_id)) => {
            likes::table
                .filter(likes::comment_id.eq(comment_id))
                .select(likes::is_like)
                .load(&mut conn)
                .await?
        }
        _ => {
            return Err(ApiError::bad_request(
                "Provide either post_id or comment_id, but not both",
            ))
        }
    };

    let like_count = rows.iter().filter(|&&is_like| is_like).count() as i64;

    Ok(Json(ReactionsResponse {
        likes: like_count,
        dislikes: rows.len() as i64 - like_count,
    }))
}
