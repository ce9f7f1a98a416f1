pub mod auth;
pub mod categories;
pub mod comments;
pub mod health;
pub mod likes;
pub mod posts;
pub mod users;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest(
            "/api/v1",
            auth::router()
                .merge(users::router())
                .merge(posts::router())
                .merge(comments::router())
                .merge(categories::router())
                .merge(likes::router()),
        )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Auth
        auth::register,
        auth::login,
        auth::logout,
        // Categories
        categories::create_category,
        categories::list_categories,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::user::UserResponse,
            crate::models::user::PublicUserResponse,
            crate::models::post::PostResponse,
            crate::models::comment::CommentDetail,
            crate::models::comment::CommentNode,
            crate::models::category::Category,
            crate::models::category::CategoryResponse,
            // Route request/response types
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            posts::CreatePostRequest,
            posts::UpdatePostRequest,
            posts::ListPostsResponse,
            comments::CreateCommentRequest,
            comments::CommentListResponse,
            categories::CreateCategoryRequest,
            likes::ToggleLikeRequest,
            likes::ToggleLikeResponse,
            likes::ReactionsResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Registration and cookie sessions"),
        (name = "Users", description = "User profiles"),
        (name = "Posts", description = "Posts"),
        (name = "Comments", description = "Threaded comments"),
        (name = "Categories", description = "Post categories"),
        (name = "Likes", description = "Reactions"),
    )
)]
pub struct ApiDoc;
