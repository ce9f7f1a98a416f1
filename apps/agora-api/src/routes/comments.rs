//! Comment endpoints: create, threaded listing, delete.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{comments, likes, posts, users};
use crate::error::{ApiError, FieldError};
use crate::models::comment::{Comment, CommentDetail, CommentNode, NewComment};
use crate::threads;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/{post_id}/comments",
            post(create_comment).get(list_comments),
        )
        .route("/comments/{comment_id}", delete(delete_comment))
}

const CONTENT_MAX: usize = 4000;

// ---------------------------------------------------------------------------
// POST /api/v1/posts/{post_id}/comments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<String>,
}

async fn create_comment(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let content = body.content.trim();
    if content.is_empty() || content.len() > CONTENT_MAX {
        return Err(ApiError::validation(vec![FieldError {
            field: "content".to_string(),
            message: format!("Comment content must be 1–{CONTENT_MAX} characters"),
        }]));
    }

    let mut conn = state.db.get().await?;

    // Check the post exists.
    posts::table
        .find(&post_id)
        .select(posts::id)
        .first::<String>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    // A reply must name a parent comment under the same post.
    if let Some(parent_id) = body.parent_id.as_deref() {
        let parent: Option<String> = comments::table
            .filter(comments::id.eq(parent_id))
            .filter(comments::post_id.eq(&post_id))
            .select(comments::id)
            .first(&mut conn)
            .await
            .optional()?;

        if parent.is_none() {
            return Err(ApiError::not_found("Parent comment not found"));
        }
    }

    let id = agora_common::id::prefixed_ulid(agora_common::id::prefix::COMMENT);

    let comment: Comment = diesel::insert_into(comments::table)
        .values(NewComment {
            id: &id,
            user_id: &user_id,
            post_id: &post_id,
            parent_id: body.parent_id.as_deref(),
            content,
            created_at: Utc::now(),
        })
        .returning(Comment::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/posts/{post_id}/comments
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentListResponse {
    pub data: Vec<CommentNode>,
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    posts::table
        .find(&post_id)
        .select(posts::id)
        .first::<String>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    // Roots first, then chronological — the order the assembler expects.
    let rows: Vec<(Comment, String, Option<String>)> = comments::table
        .inner_join(users::table)
        .filter(comments::post_id.eq(&post_id))
        .order((
            comments::parent_id.is_null().desc(),
            comments::created_at.asc(),
        ))
        .select((Comment::as_select(), users::username, users::avatar_url))
        .load(&mut conn)
        .await?;

    let ids: Vec<String> = rows.iter().map(|(c, _, _)| c.id.clone()).collect();

    let mut reactions: HashMap<String, (i64, i64)> = HashMap::new();
    if !ids.is_empty() {
        let reaction_rows: Vec<(Option<String>, bool, i64)> = likes::table
            .filter(likes::comment_id.eq_any(&ids))
            .group_by((likes::comment_id, likes::is_like))
            .select((likes::comment_id, likes::is_like, diesel::dsl::count_star()))
            .load(&mut conn)
            .await?;

        for (comment_id, is_like, count) in reaction_rows {
            let Some(comment_id) = comment_id else { continue };
            let entry = reactions.entry(comment_id).or_default();
            if is_like {
                entry.0 = count;
            } else {
                entry.1 = count;
            }
        }
    }

    let details: Vec<CommentDetail> = rows
        .into_iter()
        .map(|(comment, username, avatar_url)| {
            let (comment_likes, dislikes) =
                reactions.get(&comment.id).copied().unwrap_or((0, 0));
            CommentDetail {
                likes: comment_likes,
                dislikes,
                id: comment.id,
                user_id: comment.user_id,
                username,
                avatar_url,
                post_id: comment.post_id,
                parent_id: comment.parent_id,
                content: comment.content,
                created_at: comment.created_at,
            }
        })
        .collect();

    Ok(Json(CommentListResponse {
        data: threads::assemble(details),
    }))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/comments/{comment_id}
// ---------------------------------------------------------------------------

async fn delete_comment(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;

    let comment: Comment = comments::table
        .find(&comment_id)
        .select(Comment::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    // Only the author can delete.
    if comment.user_id != user_id {
        return Err(ApiError::forbidden("You can only delete your own comments"));
    }

    diesel::delete(comments::table.find(&comment_id))
        .execute(&mut conn)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
