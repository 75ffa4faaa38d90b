//! User model - local accounts and their public projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Account provider codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Credentials,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Credentials => "credentials",
            Provider::Google => "google",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "credentials" => Ok(Provider::Credentials),
            "google" => Ok(Provider::Google),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

/// User entity.
///
/// `password_hash` is absent for OAuth-only accounts. A credentials user
/// always has a hash once verified.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub primary_email: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub provider_code: String,
    pub is_verified: bool,
    pub verified_utc: Option<DateTime<Utc>>,
    pub is_banned: bool,
    pub banned_utc: Option<DateTime<Utc>>,
    pub twofa_enabled: bool,
    pub twofa_enabled_utc: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a provisional user reserving an email address during
    /// registration. Name and password are set on promotion.
    pub fn provisional(email: String) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            primary_email: email,
            display_name: None,
            password_hash: None,
            provider_code: Provider::Credentials.as_str().to_string(),
            is_verified: false,
            verified_utc: None,
            is_banned: false,
            banned_utc: None,
            twofa_enabled: false,
            twofa_enabled_utc: None,
            image_url: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Create a pre-verified user from an external identity assertion.
    /// The external provider already proved control of the email.
    pub fn from_external_identity(
        provider: Provider,
        email: String,
        name: Option<String>,
        image_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            primary_email: email,
            display_name: name,
            password_hash: None,
            provider_code: provider.as_str().to_string(),
            is_verified: true,
            verified_utc: Some(now),
            is_banned: false,
            banned_utc: None,
            twofa_enabled: false,
            twofa_enabled_utc: None,
            image_url,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_credentials(&self) -> bool {
        self.provider_code == Provider::Credentials.as_str()
    }

    pub fn password_hash_string(&self) -> Option<crate::utils::PasswordHashString> {
        self.password_hash
            .clone()
            .map(crate::utils::PasswordHashString::new)
    }

    /// Project to the public view (no sensitive fields).
    pub fn sanitized(&self) -> PublicUser {
        PublicUser::from(self.clone())
    }
}

/// Public-facing user view. Structurally excludes `password_hash`,
/// `verified_utc`, `banned_utc` and `is_banned`.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub user_id: Uuid,
    pub primary_email: String,
    pub display_name: Option<String>,
    pub provider_code: String,
    pub is_verified: bool,
    pub twofa_enabled: bool,
    pub twofa_enabled_utc: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            primary_email: u.primary_email,
            display_name: u.display_name,
            provider_code: u.provider_code,
            is_verified: u.is_verified,
            twofa_enabled: u.twofa_enabled,
            twofa_enabled_utc: u.twofa_enabled_utc,
            image_url: u.image_url,
            created_utc: u.created_utc,
            updated_utc: u.updated_utc,
        }
    }
}
