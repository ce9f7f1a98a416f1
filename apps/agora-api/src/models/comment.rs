use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::comments;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub post_id: &'a str,
    pub parent_id: Option<&'a str>,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
}

/// One comment row enriched with author info and reaction totals —
/// the flat input to the thread assembler.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentDetail {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub content: String,
    pub likes: i64,
    pub dislikes: i64,
    pub created_at: DateTime<Utc>,
}

/// A root comment carrying its ordered direct replies.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentDetail,
    pub replies: Vec<CommentDetail>,
}
