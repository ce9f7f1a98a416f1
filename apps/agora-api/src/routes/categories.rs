use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{categories, post_categories};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::category::{Category, CategoryResponse, NewCategory};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories).post(create_category))
}

const NAME_MAX: usize = 50;

// ---------------------------------------------------------------------------
// POST /api/v1/categories
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "Categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 409, description = "Category already exists", body = ApiErrorBody),
    ),
)]
pub async fn create_category(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() || name.len() > NAME_MAX {
        return Err(ApiError::validation(vec![FieldError {
            field: "name".to_string(),
            message: format!("Category name must be 1–{NAME_MAX} characters"),
        }]));
    }

    let mut conn = state.db.get().await?;

    let id = agora_common::id::prefixed_ulid(agora_common::id::prefix::CATEGORY);

    let category: Category = diesel::insert_into(categories::table)
        .values(NewCategory {
            id: &id,
            name,
            created_at: Utc::now(),
        })
        .returning(Category::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ApiError::conflict("A category with that name already exists"),
            other => ApiError::from(other),
        })?;

    tracing::info!(category_id = %category.id, user_id = %user_id, "category created");

    Ok((StatusCode::CREATED, Json(category)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/categories
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "Categories",
    responses(
        (status = 200, description = "All categories with post counts", body = [CategoryResponse]),
    ),
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let mut conn = state.db.get().await?;

    let all: Vec<Category> = categories::table
        .order(categories::name.asc())
        .select(Category::as_select())
        .load(&mut conn)
        .await?;

    let count_rows: Vec<(String, i64)> = post_categories::table
        .group_by(post_categories::category_id)
        .select((post_categories::category_id, diesel::dsl::count_star()))
        .load(&mut conn)
        .await?;
    let counts: HashMap<String, i64> = count_rows.into_iter().collect();

    let data = all
        .into_iter()
        .map(|category| CategoryResponse {
            posts_count: counts.get(&category.id).copied().unwrap_or(0),
            id: category.id,
            name: category.name,
            created_at: category.created_at,
        })
        .collect();

    Ok(Json(data))
}
