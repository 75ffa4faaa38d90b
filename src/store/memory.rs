//! In-memory store.
//!
//! Mirrors the Postgres implementation's semantics, including the uniqueness
//! guards and single-use token consumption, so orchestrator tests run
//! without a database.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    IssuedToken, LinkedAccount, Provider, Session, TokenScope, User, VerificationToken,
};
use crate::services::AuthError;
use crate::utils::{hash_password, verify_password, ClientMetadata, Password, PasswordHashString};

use super::{IdentityStore, SessionStore, TokenStore};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    accounts: HashMap<Uuid, LinkedAccount>,
    tokens: HashMap<Uuid, VerificationToken>,
    sessions: HashMap<Uuid, Session>,
}

/// In-memory implementation of all three store traits.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test affordance: flag a user as banned.
    pub fn ban_user(&self, user_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.is_banned = true;
            user.banned_utc = Some(Utc::now());
        }
    }

    /// Test affordance: backdate a token's expiry.
    pub fn force_expire_token(&self, token_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(token) = inner.tokens.get_mut(&token_id) {
            token.expires_utc = Utc::now() - Duration::seconds(1);
        }
    }

    /// Test affordance: change a user's primary email directly, bypassing
    /// the verification flow.
    pub fn set_primary_email(&self, user_id: Uuid, email: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.primary_email = email.to_string();
            user.updated_utc = Utc::now();
        }
    }

    pub fn user_id_by_email(&self, email: &str) -> Option<Uuid> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .values()
            .find(|u| u.primary_email.eq_ignore_ascii_case(email))
            .map(|u| u.user_id)
    }

    pub fn session_count(&self, user_id: Uuid) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }

    pub fn token_count(&self, user_id: Uuid) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .count()
    }

    pub fn account_count(&self) -> usize {
        self.inner.lock().unwrap().accounts.len()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }
}

fn email_taken(inner: &Inner, email: &str) -> bool {
    inner
        .users
        .values()
        .any(|u| u.primary_email.eq_ignore_ascii_case(email))
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.primary_email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn create_provisional_user(&self, email: &str) -> Result<User, AuthError> {
        let mut inner = self.inner.lock().unwrap();
        if email_taken(&inner, email) {
            return Err(AuthError::AlreadyExists("email already taken".to_string()));
        }
        let user = User::provisional(email.to_string());
        inner.users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn promote_to_credentials_user(
        &self,
        user_id: Uuid,
        name: &str,
        password: &Password,
    ) -> Result<User, AuthError> {
        let hash = hash_password(password).map_err(AuthError::Internal)?;
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&user_id).ok_or(AuthError::NotFound)?;
        user.display_name = Some(name.to_string());
        user.password_hash = Some(hash.into_string());
        user.is_verified = true;
        user.verified_utc = Some(Utc::now());
        user.updated_utc = Utc::now();
        Ok(user.clone())
    }

    async fn update_password(&self, user_id: Uuid, password: &Password) -> Result<User, AuthError> {
        let hash = hash_password(password).map_err(AuthError::Internal)?;
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&user_id).ok_or(AuthError::NotFound)?;
        user.password_hash = Some(hash.into_string());
        user.updated_utc = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().unwrap();
        inner.users.remove(&user_id);
        // Cascade, as the schema's FKs would
        inner.accounts.retain(|_, a| a.user_id != user_id);
        inner.tokens.retain(|_, t| t.user_id != user_id);
        inner.sessions.retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn set_twofa(&self, user_id: Uuid, enabled: bool) -> Result<User, AuthError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&user_id).ok_or(AuthError::NotFound)?;
        user.twofa_enabled = enabled;
        user.twofa_enabled_utc = if enabled { Some(Utc::now()) } else { None };
        user.updated_utc = Utc::now();
        Ok(user.clone())
    }

    async fn find_account(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<Option<LinkedAccount>, AuthError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .accounts
            .values()
            .find(|a| a.provider_code == provider.as_str() && a.subject_id == subject_id)
            .cloned())
    }

    async fn link_account(&self, account: &LinkedAccount) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner.accounts.values().any(|a| {
            a.provider_code == account.provider_code && a.subject_id == account.subject_id
        });
        if duplicate {
            return Err(AuthError::AlreadyExists(
                "external identity already linked".to_string(),
            ));
        }
        inner.accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn update_account_refresh_token(
        &self,
        account_id: Uuid,
        refresh_token: &str,
    ) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(account) = inner.accounts.get_mut(&account_id) {
            account.refresh_token = Some(refresh_token.to_string());
        }
        Ok(())
    }

    async fn create_user_with_account(
        &self,
        user: &User,
        account: &LinkedAccount,
    ) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().unwrap();
        if email_taken(&inner, &user.primary_email) {
            return Err(AuthError::AlreadyExists("email already taken".to_string()));
        }
        let duplicate = inner.accounts.values().any(|a| {
            a.provider_code == account.provider_code && a.subject_id == account.subject_id
        });
        if duplicate {
            return Err(AuthError::AlreadyExists(
                "external identity already linked".to_string(),
            ));
        }
        inner.users.insert(user.user_id, user.clone());
        inner.accounts.insert(account.account_id, account.clone());
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn issue_token(
        &self,
        user_id: Uuid,
        scope: TokenScope,
        otp: &Password,
        ttl: Duration,
        metadata: Option<&ClientMetadata>,
    ) -> Result<IssuedToken, AuthError> {
        let secret_hash = hash_password(otp).map_err(AuthError::Internal)?;
        let token = VerificationToken::new(
            user_id,
            scope,
            secret_hash.into_string(),
            Utc::now() + ttl,
            metadata.map(|m| m.ip.clone()),
            metadata.map(|m| m.user_agent.clone()),
        );
        let issued = IssuedToken {
            token_id: token.token_id,
            expires_utc: token.expires_utc,
        };
        let mut inner = self.inner.lock().unwrap();
        inner.tokens.insert(token.token_id, token);
        Ok(issued)
    }

    async fn consume_token(
        &self,
        scope: TokenScope,
        token_id: Uuid,
        otp: &Password,
    ) -> Result<Uuid, AuthError> {
        let mut inner = self.inner.lock().unwrap();

        let token = match inner.tokens.get(&token_id) {
            Some(t) if t.scope_code == scope.as_str() => t.clone(),
            _ => return Err(AuthError::NotFound),
        };

        if token.is_expired() {
            inner.tokens.remove(&token_id);
            return Err(AuthError::Expired);
        }

        let hash = PasswordHashString::new(token.secret_hash.clone());
        if verify_password(otp, &hash).is_err() {
            return Err(AuthError::InvalidCredential);
        }

        // Removal under the same lock keeps consumption at-most-once
        inner.tokens.remove(&token_id);
        Ok(token.user_id)
    }

    async fn purge_expired(&self) -> Result<u64, AuthError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.tokens.len();
        inner.tokens.retain(|_, t| !t.is_expired());
        Ok((before - inner.tokens.len()) as u64)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        user_id: Uuid,
        metadata: &ClientMetadata,
        ttl: Duration,
    ) -> Result<Session, AuthError> {
        let session = Session::new(user_id, metadata, ttl);
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.insert(session.session_id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, AuthError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sessions
            .get(&session_id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn invalidate_all_sessions(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - inner.sessions.len()) as u64)
    }
}
