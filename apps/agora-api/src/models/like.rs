use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::likes;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = likes)]
pub struct Like {
    pub id: String,
    pub user_id: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub is_like: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = likes)]
pub struct NewLike<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub post_id: Option<&'a str>,
    pub comment_id: Option<&'a str>,
    pub is_like: bool,
    pub created_at: DateTime<Utc>,
}
