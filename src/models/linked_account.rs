//! Linked account model - external identities tied to a local user.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Provider;

/// External identity linked to a local user.
///
/// `(provider_code, subject_id)` is globally unique: at most one local user
/// per external identity. `email` is the external email at link time; the
/// subject id, not the email, stays authoritative afterwards.
#[derive(Debug, Clone, FromRow)]
pub struct LinkedAccount {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub provider_code: String,
    pub subject_id: String,
    pub email: String,
    pub refresh_token: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl LinkedAccount {
    pub fn new(
        user_id: Uuid,
        provider: Provider,
        subject_id: String,
        email: String,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            user_id,
            provider_code: provider.as_str().to_string(),
            subject_id,
            email,
            refresh_token,
            created_utc: Utc::now(),
        }
    }
}
