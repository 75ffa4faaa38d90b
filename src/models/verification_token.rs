//! Verification token model - scoped, single-use OTP challenges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Token scope codes. The scope restricts what a successful consumption
/// authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    EmailVerify,
    PasswordReset,
    TwofaLogin,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::EmailVerify => "email_verify",
            TokenScope::PasswordReset => "password_reset",
            TokenScope::TwofaLogin => "twofa_login",
        }
    }
}

impl std::str::FromStr for TokenScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email_verify" => Ok(TokenScope::EmailVerify),
            "password_reset" => Ok(TokenScope::PasswordReset),
            "twofa_login" => Ok(TokenScope::TwofaLogin),
            _ => Err(format!("Invalid token scope: {}", s)),
        }
    }
}

/// Verification token entity. `secret_hash` holds the Argon2 hash of the
/// OTP; the plaintext is never persisted. The row is deleted on the first
/// successful consumption.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub scope_code: String,
    pub secret_hash: String,
    pub expires_utc: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(
        user_id: Uuid,
        scope: TokenScope,
        secret_hash: String,
        expires_utc: DateTime<Utc>,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            token_id: Uuid::new_v4(),
            user_id,
            scope_code: scope.as_str().to_string(),
            secret_hash,
            expires_utc,
            ip,
            user_agent,
            created_utc: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_utc
    }
}

/// Issuance receipt returned to the caller. The OTP itself travels only
/// through the notifier.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token_id: Uuid,
    pub expires_utc: DateTime<Utc>,
}
