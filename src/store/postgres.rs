//! PostgreSQL store.
//!
//! sqlx over a shared pool. The schema in `migrations/` carries the unique
//! indexes this module relies on: lowercased email on users and
//! (provider_code, subject_id) on linked_accounts.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    IssuedToken, LinkedAccount, Provider, Session, TokenScope, User, VerificationToken,
};
use crate::services::AuthError;
use crate::utils::{hash_password, verify_password, ClientMetadata, Password, PasswordHashString};

use super::{IdentityStore, SessionStore, TokenStore};

/// PostgreSQL-backed implementation of the store traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(primary_email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AuthError::from)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AuthError::from)
    }

    async fn create_provisional_user(&self, email: &str) -> Result<User, AuthError> {
        let user = User::provisional(email.to_string());
        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id, primary_email, provider_code, is_verified, is_banned, twofa_enabled, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.primary_email)
        .bind(&user.provider_code)
        .bind(user.is_verified)
        .bind(user.is_banned)
        .bind(user.twofa_enabled)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            // The unique index closes the check-then-insert window; a lost
            // race is reported the same way as a taken email.
            Err(e) if is_unique_violation(&e) => {
                Err(AuthError::AlreadyExists("email already taken".to_string()))
            }
            Err(e) => Err(AuthError::from(e)),
        }
    }

    async fn promote_to_credentials_user(
        &self,
        user_id: Uuid,
        name: &str,
        password: &Password,
    ) -> Result<User, AuthError> {
        let hash = hash_password(password).map_err(AuthError::Internal)?;
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET display_name = $2,
                password_hash = $3,
                is_verified = true,
                verified_utc = NOW(),
                updated_utc = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)?
        .ok_or(AuthError::NotFound)
    }

    async fn update_password(&self, user_id: Uuid, password: &Password) -> Result<User, AuthError> {
        let hash = hash_password(password).map_err(AuthError::Internal)?;
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $2, updated_utc = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)?
        .ok_or(AuthError::NotFound)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn set_twofa(&self, user_id: Uuid, enabled: bool) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET twofa_enabled = $2,
                twofa_enabled_utc = CASE WHEN $2 THEN NOW() ELSE NULL END,
                updated_utc = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)?
        .ok_or(AuthError::NotFound)
    }

    async fn find_account(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<Option<LinkedAccount>, AuthError> {
        sqlx::query_as::<_, LinkedAccount>(
            "SELECT * FROM linked_accounts WHERE provider_code = $1 AND subject_id = $2",
        )
        .bind(provider.as_str())
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)
    }

    async fn link_account(&self, account: &LinkedAccount) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
            INSERT INTO linked_accounts (account_id, user_id, provider_code, subject_id, email, refresh_token, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.account_id)
        .bind(account.user_id)
        .bind(&account.provider_code)
        .bind(&account.subject_id)
        .bind(&account.email)
        .bind(&account.refresh_token)
        .bind(account.created_utc)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(AuthError::AlreadyExists(
                "external identity already linked".to_string(),
            )),
            Err(e) => Err(AuthError::from(e)),
        }
    }

    async fn update_account_refresh_token(
        &self,
        account_id: Uuid,
        refresh_token: &str,
    ) -> Result<(), AuthError> {
        sqlx::query("UPDATE linked_accounts SET refresh_token = $2 WHERE account_id = $1")
            .bind(account_id)
            .bind(refresh_token)
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn create_user_with_account(
        &self,
        user: &User,
        account: &LinkedAccount,
    ) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await.map_err(AuthError::from)?;

        let user_insert = sqlx::query(
            r#"
            INSERT INTO users (user_id, primary_email, display_name, provider_code, is_verified, verified_utc, is_banned, twofa_enabled, image_url, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.primary_email)
        .bind(&user.display_name)
        .bind(&user.provider_code)
        .bind(user.is_verified)
        .bind(user.verified_utc)
        .bind(user.is_banned)
        .bind(user.twofa_enabled)
        .bind(&user.image_url)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&mut *tx)
        .await;

        if let Err(e) = user_insert {
            if is_unique_violation(&e) {
                return Err(AuthError::AlreadyExists("email already taken".to_string()));
            }
            return Err(AuthError::from(e));
        }

        sqlx::query(
            r#"
            INSERT INTO linked_accounts (account_id, user_id, provider_code, subject_id, email, refresh_token, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.account_id)
        .bind(account.user_id)
        .bind(&account.provider_code)
        .bind(&account.subject_id)
        .bind(&account.email)
        .bind(&account.refresh_token)
        .bind(account.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(AuthError::from)?;

        tx.commit().await.map_err(AuthError::from)?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgStore {
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

        sqlx::query(
            r#"
            INSERT INTO verification_tokens (token_id, user_id, scope_code, secret_hash, expires_utc, ip, user_agent, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.token_id)
        .bind(token.user_id)
        .bind(&token.scope_code)
        .bind(&token.secret_hash)
        .bind(token.expires_utc)
        .bind(&token.ip)
        .bind(&token.user_agent)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;

        Ok(IssuedToken {
            token_id: token.token_id,
            expires_utc: token.expires_utc,
        })
    }

    async fn consume_token(
        &self,
        scope: TokenScope,
        token_id: Uuid,
        otp: &Password,
    ) -> Result<Uuid, AuthError> {
        let token = sqlx::query_as::<_, VerificationToken>(
            "SELECT * FROM verification_tokens WHERE token_id = $1 AND scope_code = $2",
        )
        .bind(token_id)
        .bind(scope.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)?
        .ok_or(AuthError::NotFound)?;

        if token.is_expired() {
            sqlx::query("DELETE FROM verification_tokens WHERE token_id = $1")
                .bind(token_id)
                .execute(&self.pool)
                .await
                .map_err(AuthError::from)?;
            return Err(AuthError::Expired);
        }

        let hash = PasswordHashString::new(token.secret_hash.clone());
        if verify_password(otp, &hash).is_err() {
            // Wrong OTP leaves the row; retries stay possible until expiry
            return Err(AuthError::InvalidCredential);
        }

        // The delete's row count is the at-most-once guard: of two
        // concurrent consumers only one observes an affected row.
        let deleted = sqlx::query("DELETE FROM verification_tokens WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;

        if deleted.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }

        Ok(token.user_id)
    }

    async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE expires_utc < NOW()")
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(
        &self,
        user_id: Uuid,
        metadata: &ClientMetadata,
        ttl: Duration,
    ) -> Result<Session, AuthError> {
        let session = Session::new(user_id, metadata, ttl);
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, expires_utc, ip, user_agent, os, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(session.expires_utc)
        .bind(&session.ip)
        .bind(&session.user_agent)
        .bind(&session.os)
        .bind(session.created_utc)
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;

        Ok(session)
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, AuthError> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE session_id = $1 AND expires_utc > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)
    }

    async fn invalidate_all_sessions(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(result.rows_affected())
    }
}
