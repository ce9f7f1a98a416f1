//! Cookie-session management: token issuance, resolution, invalidation,
//! and periodic garbage collection of expired rows.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use rand::Rng;

use crate::db::pool::DbPool;
use crate::db::schema::sessions;
use crate::error::ApiError;
use crate::models::session::NewSession;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Generate an opaque random session token (`ses_` prefix, 256 bits).
pub fn generate_session_token() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let mut buf = [0u8; 32];
    rand::thread_rng().fill(&mut buf[..]);
    format!("ses_{}", URL_SAFE_NO_PAD.encode(buf))
}

/// Maps opaque session tokens to user identities.
///
/// Constructed once in `main` with the shared pool and handed to the
/// router state — there is no ambient global. Expiry is enforced at
/// resolve time; the sweeper only garbage-collects rows that resolve
/// would already reject.
#[derive(Clone)]
pub struct SessionManager {
    db: DbPool,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: DbPool, ttl_hours: i64) -> Self {
        Self {
            db,
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a session for `user_id` and return the opaque token.
    pub async fn create(&self, user_id: &str) -> Result<String, ApiError> {
        let token = generate_session_token();
        let mut conn = self.db.get().await?;

        diesel::insert_into(sessions::table)
            .values(NewSession {
                id: &token,
                user_id,
                created_at: Utc::now(),
            })
            .execute(&mut conn)
            .await?;

        Ok(token)
    }

    /// Resolve a token to its owning user id.
    ///
    /// Returns `Ok(None)` for unknown tokens and for tokens older than
    /// the TTL, even if the sweeper has not removed them yet. Database
    /// failures propagate as errors — they are never reported as an
    /// unauthenticated outcome.
    pub async fn resolve(&self, token: &str) -> Result<Option<String>, ApiError> {
        let mut conn = self.db.get().await?;

        let row: Option<(String, DateTime<Utc>)> = sessions::table
            .find(token)
            .select((sessions::user_id, sessions::created_at))
            .first(&mut conn)
            .await
            .optional()?;

        match row {
            Some((user_id, created_at))
                if Utc::now().signed_duration_since(created_at) <= self.ttl =>
            {
                Ok(Some(user_id))
            }
            _ => Ok(None),
        }
    }

    /// Delete a session. Deleting an already-absent token is not an error.
    pub async fn invalidate(&self, token: &str) -> Result<(), ApiError> {
        let mut conn = self.db.get().await?;

        diesel::delete(sessions::table.find(token))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Delete every session older than the TTL. Returns the number removed.
    pub async fn sweep(&self) -> Result<usize, ApiError> {
        let cutoff = Utc::now() - self.ttl;
        let mut conn = self.db.get().await?;

        let removed = diesel::delete(sessions::table.filter(sessions::created_at.le(cutoff)))
            .execute(&mut conn)
            .await?;

        Ok(removed)
    }

    /// Start a background task that sweeps expired sessions on a fixed
    /// interval. A failed tick is logged and the loop continues.
    pub fn spawn_sweeper(&self, interval_secs: u64) {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match manager.sweep().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "expired sessions swept"),
                    Err(err) => tracing::warn!(?err, "session sweep failed"),
                }
            }
        });
    }
}
