//! Session model - per-user authenticated sessions with client metadata.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::ClientMetadata;

/// Default absolute session lifetime.
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Session entity. Expires passively at `expires_utc`; all sessions for a
/// user are deleted en masse when the password changes. The row is the
/// source of truth for revocation regardless of what the signed credential
/// artifact says.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub expires_utc: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
    pub os: String,
    pub created_utc: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, metadata: &ClientMetadata, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            expires_utc: now + ttl,
            ip: metadata.ip.clone(),
            user_agent: metadata.user_agent.clone(),
            os: metadata.os.clone(),
            created_utc: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_utc
    }
}
