use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{IssuedToken, PublicUser, TokenScope};
use crate::services::{AuthError, Notifier, SessionSigner};
use crate::store::{IdentityStore, SessionStore, TokenStore};
use crate::utils::{ClientMetadata, OtpGenerator, Password};

const VERIFY_EMAIL_TITLE: &str = "Verify your email";
const VERIFY_EMAIL_DESC: &str = "Use this code to verify your email address:";
const RESET_EMAIL_TITLE: &str = "Reset your password";
const RESET_EMAIL_DESC: &str = "Use this code to reset your password:";
const TWOFA_EMAIL_TITLE: &str = "Your sign-in code";
const TWOFA_EMAIL_DESC: &str = "Use this code to finish signing in:";

/// Token and session lifetimes, taken from configuration.
#[derive(Debug, Clone)]
pub struct AuthTtls {
    pub email_verify: Duration,
    pub password_reset: Duration,
    pub twofa_login: Duration,
    pub session: Duration,
}

impl Default for AuthTtls {
    fn default() -> Self {
        Self {
            email_verify: Duration::minutes(15),
            password_reset: Duration::minutes(15),
            twofa_login: Duration::minutes(10),
            session: Duration::days(crate::models::DEFAULT_SESSION_TTL_DAYS),
        }
    }
}

/// A completed sign-in: the signed credential artifact plus the sanitized
/// user it belongs to.
#[derive(Debug, Serialize)]
pub struct AuthSuccess {
    pub token: String,
    pub user: PublicUser,
}

/// Outcome of a password sign-in. Accounts with two-factor enabled get a
/// challenge instead of a session; the caller completes it separately.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignInOutcome {
    Authenticated(AuthSuccess),
    TwofaChallenge(IssuedToken),
}

/// Stateless flow orchestrator. All state lives in the stores; each call
/// is an independent request/response step.
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    tokens: Arc<dyn TokenStore>,
    sessions: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    otp: Arc<dyn OtpGenerator>,
    signer: SessionSigner,
    ttls: AuthTtls,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        tokens: Arc<dyn TokenStore>,
        sessions: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        otp: Arc<dyn OtpGenerator>,
        signer: SessionSigner,
        ttls: AuthTtls,
    ) -> Self {
        Self {
            identities,
            tokens,
            sessions,
            notifier,
            otp,
            signer,
            ttls,
        }
    }

    /// Start registration: reserve the email with a provisional user and
    /// send a verification OTP. If the email cannot be delivered the
    /// provisional user is rolled back so the address is not left
    /// reserved by a dead registration.
    pub async fn initialize(&self, email: &str) -> Result<IssuedToken, AuthError> {
        if self.identities.find_user_by_email(email).await?.is_some() {
            return Err(AuthError::AlreadyExists("email already taken".to_string()));
        }

        // The unique constraint closes the check/insert window
        let user = self.identities.create_provisional_user(email).await?;

        let otp = self.otp.generate();
        let issued = self
            .tokens
            .issue_token(
                user.user_id,
                TokenScope::EmailVerify,
                &Password::new(otp.clone()),
                self.ttls.email_verify,
                None,
            )
            .await?;

        if let Err(e) = self
            .notifier
            .send_otp_email(email, VERIFY_EMAIL_TITLE, VERIFY_EMAIL_DESC, &otp)
            .await
        {
            tracing::warn!(user_id = %user.user_id, "Rolling back provisional user after delivery failure");
            self.identities.delete_user(user.user_id).await?;
            return Err(e);
        }

        tracing::info!(user_id = %user.user_id, "Registration initialized");
        Ok(issued)
    }

    /// Finish registration: consume the verification token, promote the
    /// provisional user to a credentials user, and open a session.
    ///
    /// The token is spent before the promotion, so a failure past that
    /// point is reported as `Internal` and the caller must restart with a
    /// fresh `initialize`. Tokens are cheap to reissue; replay is not.
    pub async fn complete_registration(
        &self,
        token_id: Uuid,
        otp: &Password,
        name: &str,
        password: &Password,
        metadata: &ClientMetadata,
    ) -> Result<AuthSuccess, AuthError> {
        let user_id = self
            .tokens
            .consume_token(TokenScope::EmailVerify, token_id, otp)
            .await?;

        let user = self
            .identities
            .promote_to_credentials_user(user_id, name, password)
            .await
            .map_err(AuthError::into_internal)?;

        tracing::info!(user_id = %user.user_id, "Registration completed");
        self.open_session(user, metadata)
            .await
            .map_err(AuthError::into_internal)
    }

    /// Issue a fresh verification OTP for an unverified credentials user.
    /// Outstanding tokens stay live; each remains independently
    /// single-use until it expires.
    pub async fn resend_email_verification(&self, email: &str) -> Result<IssuedToken, AuthError> {
        let user = self
            .identities
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.is_verified {
            return Err(AuthError::AlreadyExists(
                "email already verified".to_string(),
            ));
        }
        if !user.is_credentials() {
            return Err(AuthError::WrongProvider);
        }
        if user.is_banned {
            return Err(AuthError::Banned);
        }

        let otp = self.otp.generate();
        let issued = self
            .tokens
            .issue_token(
                user.user_id,
                TokenScope::EmailVerify,
                &Password::new(otp.clone()),
                self.ttls.email_verify,
                None,
            )
            .await?;

        self.notifier
            .send_otp_email(email, VERIFY_EMAIL_TITLE, VERIFY_EMAIL_DESC, &otp)
            .await?;

        tracing::info!(user_id = %user.user_id, "Verification email resent");
        Ok(issued)
    }

    /// Password sign-in. Absent user, provider mismatch, missing hash, and
    /// wrong password all collapse into the same `InvalidCredential` so
    /// the response never reveals which check failed.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &Password,
        metadata: &ClientMetadata,
    ) -> Result<SignInOutcome, AuthError> {
        let user = self
            .identities
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        if !user.is_credentials() {
            return Err(AuthError::InvalidCredential);
        }
        let hash = user
            .password_hash_string()
            .ok_or(AuthError::InvalidCredential)?;

        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }
        if user.is_banned {
            return Err(AuthError::Banned);
        }

        crate::utils::verify_password(password, &hash)
            .map_err(|_| AuthError::InvalidCredential)?;

        if user.twofa_enabled {
            let otp = self.otp.generate();
            let issued = self
                .tokens
                .issue_token(
                    user.user_id,
                    TokenScope::TwofaLogin,
                    &Password::new(otp.clone()),
                    self.ttls.twofa_login,
                    Some(metadata),
                )
                .await?;

            self.notifier
                .send_otp_email(email, TWOFA_EMAIL_TITLE, TWOFA_EMAIL_DESC, &otp)
                .await?;

            tracing::info!(user_id = %user.user_id, "Two-factor challenge issued");
            return Ok(SignInOutcome::TwofaChallenge(issued));
        }

        tracing::info!(user_id = %user.user_id, "User signed in");
        let success = self.open_session(user, metadata).await?;
        Ok(SignInOutcome::Authenticated(success))
    }

    /// Second sign-in step for two-factor accounts: consume the challenge
    /// token and open the session.
    pub async fn complete_twofa(
        &self,
        token_id: Uuid,
        otp: &Password,
        metadata: &ClientMetadata,
    ) -> Result<AuthSuccess, AuthError> {
        let user_id = self
            .tokens
            .consume_token(TokenScope::TwofaLogin, token_id, otp)
            .await?;

        let user = self
            .identities
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.is_banned {
            return Err(AuthError::Banned);
        }

        tracing::info!(user_id = %user.user_id, "Two-factor sign-in completed");
        self.open_session(user, metadata).await
    }

    /// Start a password reset. Client metadata is recorded on the token
    /// for audit.
    pub async fn request_password_reset(
        &self,
        email: &str,
        metadata: &ClientMetadata,
    ) -> Result<IssuedToken, AuthError> {
        let user = self
            .identities
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }
        if !user.is_credentials() {
            return Err(AuthError::WrongProvider);
        }
        if user.is_banned {
            return Err(AuthError::Banned);
        }

        let otp = self.otp.generate();
        let issued = self
            .tokens
            .issue_token(
                user.user_id,
                TokenScope::PasswordReset,
                &Password::new(otp.clone()),
                self.ttls.password_reset,
                Some(metadata),
            )
            .await?;

        self.notifier
            .send_otp_email(email, RESET_EMAIL_TITLE, RESET_EMAIL_DESC, &otp)
            .await?;

        tracing::info!(user_id = %user.user_id, "Password reset requested");
        Ok(issued)
    }

    /// Finish a password reset: consume the token, re-validate the
    /// resolved user, then rewrite the password and drop every live
    /// session. The user state is re-checked after consumption so a token
    /// issued before a ban cannot be spent. No auto sign-in.
    pub async fn reset_password(
        &self,
        token_id: Uuid,
        otp: &Password,
        new_password: &Password,
    ) -> Result<(), AuthError> {
        let user_id = self
            .tokens
            .consume_token(TokenScope::PasswordReset, token_id, otp)
            .await?;

        let user = self
            .identities
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }
        if !user.is_credentials() {
            return Err(AuthError::WrongProvider);
        }
        if user.is_banned {
            return Err(AuthError::Banned);
        }

        self.identities.update_password(user_id, new_password).await?;
        let dropped = self.sessions.invalidate_all_sessions(user_id).await?;

        tracing::info!(user_id = %user_id, sessions_dropped = dropped, "Password reset completed");
        Ok(())
    }

    /// Flip email-based two-factor on or off for a user.
    pub async fn toggle_twofa(&self, user_id: Uuid, enable: bool) -> Result<PublicUser, AuthError> {
        let user = self
            .identities
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.is_banned {
            return Err(AuthError::Banned);
        }

        let updated = self.identities.set_twofa(user_id, enable).await?;
        tracing::info!(user_id = %user_id, enabled = enable, "Two-factor setting changed");
        Ok(updated.sanitized())
    }

    /// Resolve a credential artifact back to its user: the signature and
    /// embedded expiry must check out, the session row must still exist,
    /// and the user must be in good standing.
    pub async fn authenticate(&self, artifact: &str) -> Result<PublicUser, AuthError> {
        let claims = self.signer.verify(artifact)?;

        let session = self
            .sessions
            .find_session(claims.sid)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        let user = self
            .identities
            .find_user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        if user.is_banned {
            return Err(AuthError::Banned);
        }

        Ok(user.sanitized())
    }

    /// GC sweep over expired token rows.
    pub async fn purge_expired_tokens(&self) -> Result<u64, AuthError> {
        let purged = self.tokens.purge_expired().await?;
        if purged > 0 {
            tracing::info!(purged, "Purged expired verification tokens");
        }
        Ok(purged)
    }

    async fn open_session(
        &self,
        user: crate::models::User,
        metadata: &ClientMetadata,
    ) -> Result<AuthSuccess, AuthError> {
        let session = self
            .sessions
            .create_session(user.user_id, metadata, self.ttls.session)
            .await?;
        let token = self.signer.sign(&session)?;

        Ok(AuthSuccess {
            token,
            user: user.sanitized(),
        })
    }
}
