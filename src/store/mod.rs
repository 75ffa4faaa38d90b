//! Repository interfaces over the transactional store.
//!
//! The orchestrator only sees these traits; the Postgres implementation is
//! the production backend and the in-memory implementation backs the tests.
//! Uniqueness guarantees (email, provider+subject) and the at-most-once
//! token consumption live behind these seams.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::models::{IssuedToken, LinkedAccount, Provider, Session, TokenScope, User};
use crate::services::AuthError;
use crate::utils::{ClientMetadata, Password};

/// CRUD over users and their linked external accounts.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError>;

    /// Reserve an email with a minimal unverified placeholder. The unique
    /// constraint on the email column is the authoritative guard; a lost
    /// insert race surfaces as `AlreadyExists`.
    async fn create_provisional_user(&self, email: &str) -> Result<User, AuthError>;

    /// Set name and password hash, mark verified, stamp the verification
    /// time. Atomic row update; compensation after downstream failures is
    /// the caller's job.
    async fn promote_to_credentials_user(
        &self,
        user_id: Uuid,
        name: &str,
        password: &Password,
    ) -> Result<User, AuthError>;

    async fn update_password(&self, user_id: Uuid, password: &Password) -> Result<User, AuthError>;

    /// Compensating rollback for a provisional user whose OTP email never
    /// went out.
    async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError>;

    async fn set_twofa(&self, user_id: Uuid, enabled: bool) -> Result<User, AuthError>;

    async fn find_account(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<Option<LinkedAccount>, AuthError>;

    async fn link_account(&self, account: &LinkedAccount) -> Result<(), AuthError>;

    /// Tokens rotate; always overwrite, never append.
    async fn update_account_refresh_token(
        &self,
        account_id: Uuid,
        refresh_token: &str,
    ) -> Result<(), AuthError>;

    /// Insert a new user together with its first linked account as a single
    /// atomic operation.
    async fn create_user_with_account(
        &self,
        user: &User,
        account: &LinkedAccount,
    ) -> Result<(), AuthError>;
}

/// CRUD over scoped, single-use, expiring verification tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Hash the OTP and persist a new scoped token record. The plaintext is
    /// never stored.
    async fn issue_token(
        &self,
        user_id: Uuid,
        scope: TokenScope,
        otp: &Password,
        ttl: Duration,
        metadata: Option<&ClientMetadata>,
    ) -> Result<IssuedToken, AuthError>;

    /// Resolve a token to its owning user. Exactly one successful
    /// consumption is possible per issued token: success deletes the row in
    /// the same operation. A wrong OTP leaves the row in place for retries
    /// until expiry; expiry deletes it.
    async fn consume_token(
        &self,
        scope: TokenScope,
        token_id: Uuid,
        otp: &Password,
    ) -> Result<Uuid, AuthError>;

    /// GC sweep for expired rows. Returns the number deleted.
    async fn purge_expired(&self) -> Result<u64, AuthError>;
}

/// CRUD over sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        user_id: Uuid,
        metadata: &ClientMetadata,
        ttl: Duration,
    ) -> Result<Session, AuthError>;

    /// Live sessions only; expired rows are reported as absent.
    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, AuthError>;

    /// Set-based delete of every session owned by the user. Invoked on
    /// password change as a defense against credential reuse. Safe to race
    /// with a concurrent create: a session created after the delete simply
    /// survives, reflecting the freshest credential.
    async fn invalidate_all_sessions(&self, user_id: Uuid) -> Result<u64, AuthError>;
}
