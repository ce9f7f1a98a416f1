//! Post CRUD, listing, and trending endpoints.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{categories, comments, likes, post_categories, posts, users};
use crate::error::{ApiError, FieldError};
use crate::models::post::{NewPost, Post, PostResponse, UpdatePost};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", axum::routing::post(create_post).get(list_posts))
        .route("/posts/trending", get(trending_posts))
        .route(
            "/posts/{post_id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

const TITLE_MAX: usize = 200;
const CONTENT_MAX: usize = 10_000;

// ---------------------------------------------------------------------------
// POST /api/v1/posts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

async fn create_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let title = body.title.trim();
    let content = body.content.trim();

    let mut errors = Vec::new();
    if title.is_empty() || title.len() > TITLE_MAX {
        errors.push(FieldError {
            field: "title".to_string(),
            message: format!("Title must be 1–{TITLE_MAX} characters"),
        });
    }
    if content.is_empty() || content.len() > CONTENT_MAX {
        errors.push(FieldError {
            field: "content".to_string(),
            message: format!("Content must be 1–{CONTENT_MAX} characters"),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let mut conn = state.db.get().await?;

    // Every requested category must exist.
    if !body.category_ids.is_empty() {
        let known: Vec<String> = categories::table
            .filter(categories::id.eq_any(&body.category_ids))
            .select(categories::id)
            .load(&mut conn)
            .await?;

        if known.len() != body.category_ids.len() {
            return Err(ApiError::not_found("Category not found"));
        }
    }

    let id = agora_common::id::prefixed_ulid(agora_common::id::prefix::POST);
    let now = Utc::now();

    let post: Post = diesel::insert_into(posts::table)
        .values(NewPost {
            id: &id,
            user_id: &user_id,
            title,
            content,
            created_at: now,
            updated_at: now,
        })
        .returning(Post::as_returning())
        .get_result(&mut conn)
        .await?;

    if !body.category_ids.is_empty() {
        let links: Vec<_> = body
            .category_ids
            .iter()
            .map(|category_id| {
                (
                    post_categories::post_id.eq(&post.id),
                    post_categories::category_id.eq(category_id),
                )
            })
            .collect();

        diesel::insert_into(post_categories::table)
            .values(links)
            .execute(&mut conn)
            .await?;
    }

    tracing::info!(post_id = %post.id, user_id = %user_id, "post created");

    Ok((StatusCode::CREATED, Json(post)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/posts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListPostsParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListPostsResponse {
    pub data: Vec<PostResponse>,
    pub page: i64,
    pub has_more: bool,
}

async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListPostsParams>,
) -> Result<Json<ListPostsResponse>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let mut conn = state.db.get().await?;

    let rows: Vec<(Post, String, Option<String>)> = posts::table
        .inner_join(users::table)
        .order(posts::created_at.desc())
        .limit(limit + 1)
        .offset(offset)
        .select((Post::as_select(), users::username, users::avatar_url))
        .load(&mut conn)
        .await?;

    let has_more = rows.len() as i64 > limit;
    let rows: Vec<_> = rows.into_iter().take(limit as usize).collect();

    let data = build_post_responses(&mut conn, rows).await?;

    Ok(Json(ListPostsResponse {
        data,
        page,
        has_more,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/posts/trending
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendingPostsResponse {
    pub data: Vec<PostResponse>,
}

/// Posts from the last 7 days ranked by reactions plus comments, top 10.
async fn trending_posts(
    State(state): State<AppState>,
) -> Result<Json<TrendingPostsResponse>, ApiError> {
    let cutoff = Utc::now() - Duration::days(7);
    let mut conn = state.db.get().await?;

    let rows: Vec<(Post, String, Option<String>)> = posts::table
        .inner_join(users::table)
        .filter(posts::created_at.ge(cutoff))
        .order(posts::created_at.desc())
        .select((Post::as_select(), users::username, users::avatar_url))
        .load(&mut conn)
        .await?;

    let mut data = build_post_responses(&mut conn, rows).await?;
    data.sort_by_key(|p| std::cmp::Reverse(p.likes + p.comment_count));
    data.truncate(10);

    Ok(Json(TrendingPostsResponse { data }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/posts/{post_id}
// ---------------------------------------------------------------------------

async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let row: (Post, String, Option<String>) = posts::table
        .inner_join(users::table)
        .filter(posts::id.eq(&post_id))
        .select((Post::as_select(), users::username, users::avatar_url))
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let mut data = build_post_responses(&mut conn, vec![row]).await?;

    Ok(Json(data.remove(0)))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/posts/{post_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

async fn update_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(body): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let mut conn = state.db.get().await?;

    let post: Post = posts::table
        .find(&post_id)
        .select(Post::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    // Only the author can edit.
    if post.user_id != user_id {
        return Err(ApiError::forbidden("You can only edit your own posts"));
    }

    let title = body.title.as_deref().map(str::trim);
    let content = body.content.as_deref().map(str::trim);

    let mut errors = Vec::new();
    if let Some(t) = title {
        if t.is_empty() || t.len() > TITLE_MAX {
            errors.push(FieldError {
                field: "title".to_string(),
                message: format!("Title must be 1–{TITLE_MAX} characters"),
            });
        }
    }
    if let Some(c) = content {
        if c.is_empty() || c.len() > CONTENT_MAX {
            errors.push(FieldError {
                field: "content".to_string(),
                message: format!("Content must be 1–{CONTENT_MAX} characters"),
            });
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let changeset = UpdatePost {
        title: title.map(str::to_string),
        content: content.map(str::to_string),
        updated_at: Utc::now(),
    };

    let updated: Post = diesel::update(posts::table.find(&post_id))
        .set(&changeset)
        .returning(Post::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/posts/{post_id}
// ---------------------------------------------------------------------------

async fn delete_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;

    let post: Post = posts::table
        .find(&post_id)
        .select(Post::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    if post.user_id != user_id {
        return Err(ApiError::forbidden("You can only delete your own posts"));
    }

    diesel::delete(posts::table.find(&post_id))
        .execute(&mut conn)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Response assembly
// ---------------------------------------------------------------------------

/// Join a page of post rows with reaction totals, comment counts, and
/// category links, batched so the whole page costs three extra queries.
async fn build_post_responses(
    conn: &mut AsyncPgConnection,
    rows: Vec<(Post, String, Option<String>)>,
) -> Result<Vec<PostResponse>, ApiError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = rows.iter().map(|(p, _, _)| p.id.clone()).collect();

    let reaction_rows: Vec<(Option<String>, bool, i64)> = likes::table
        .filter(likes::post_id.eq_any(&ids))
        .group_by((likes::post_id, likes::is_like))
        .select((likes::post_id, likes::is_like, diesel::dsl::count_star()))
        .load(conn)
        .await?;

    let mut reactions: HashMap<String, (i64, i64)> = HashMap::new();
    for (post_id, is_like, count) in reaction_rows {
        let Some(post_id) = post_id else { continue };
        let entry = reactions.entry(post_id).or_default();
        if is_like {
            entry.0 = count;
        } else {
            entry.1 = count;
        }
    }

    let comment_rows: Vec<(String, i64)> = comments::table
        .filter(comments::post_id.eq_any(&ids))
        .group_by(comments::post_id)
        .select((comments::post_id, diesel::dsl::count_star()))
        .load(conn)
        .await?;
    let comment_counts: HashMap<String, i64> = comment_rows.into_iter().collect();

    let category_rows: Vec<(String, String)> = post_categories::table
        .filter(post_categories::post_id.eq_any(&ids))
        .select((post_categories::post_id, post_categories::category_id))
        .load(conn)
        .await?;

    let mut category_ids: HashMap<String, Vec<String>> = HashMap::new();
    for (post_id, category_id) in category_rows {
        category_ids.entry(post_id).or_default().push(category_id);
    }

    Ok(rows
        .into_iter()
        .map(|(post, username, avatar_url)| {
            let (post_likes, dislikes) = reactions.get(&post.id).copied().unwrap_or((0, 0));
            PostResponse {
                likes: post_likes,
                dislikes,
                comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                category_ids: category_ids.remove(&post.id).unwrap_or_default(),
                id: post.id,
                user_id: post.user_id,
                username,
                avatar_url,
                title: post.title,
                content: post.content,
                created_at: post.created_at,
                updated_at: post.updated_at,
            }
        })
        .collect())
}
