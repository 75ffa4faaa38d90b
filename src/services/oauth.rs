use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GoogleConfig;
use crate::models::{LinkedAccount, Provider, User};
use crate::services::auth::AuthSuccess;
use crate::services::{AuthError, Notifier, SessionSigner};
use crate::store::{IdentityStore, SessionStore};
use crate::utils::ClientMetadata;

/// An identity assertion obtained from an external provider.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub subject_id: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture_url: Option<String>,
}

/// Provider-side exchange: turns an authorization code into a verified
/// identity assertion plus an optional refresh token.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    async fn fetch_identity(
        &self,
        code: &str,
    ) -> Result<(ExternalIdentity, Option<String>), AuthError>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    verified_email: bool,
    name: Option<String>,
    picture: Option<String>,
}

/// Google OAuth client: authorization-code exchange followed by a
/// userinfo lookup. Both calls are bounded by the client timeout.
pub struct GoogleOauthClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleOauthClient {
    pub fn new(config: &GoogleConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Internal(anyhow::Error::new(e)))?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }
}

#[async_trait]
impl IdentityProviderClient for GoogleOauthClient {
    async fn fetch_identity(
        &self,
        code: &str,
    ) -> Result<(ExternalIdentity, Option<String>), AuthError> {
        let token_res = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to exchange Google code");
                AuthError::ExternalProvider(anyhow::Error::new(e))
            })?;

        if !token_res.status().is_success() {
            let status = token_res.status();
            let err_body = token_res.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %err_body, "Google token exchange error");
            return Err(AuthError::ExternalProvider(anyhow::anyhow!(
                "token exchange returned {}",
                status
            )));
        }

        let token_data: GoogleTokenResponse = token_res.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Google token response");
            AuthError::ExternalProvider(anyhow::Error::new(e))
        })?;

        let user_info_res = self
            .client
            .get("https://www.googleapis.com/oauth2/v2/userinfo")
            .bearer_auth(&token_data.access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch Google user info");
                AuthError::ExternalProvider(anyhow::Error::new(e))
            })?;

        let user_info: GoogleUserInfo = user_info_res.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Google user info");
            AuthError::ExternalProvider(anyhow::Error::new(e))
        })?;

        let identity = ExternalIdentity {
            subject_id: user_info.id,
            email: user_info.email,
            email_verified: user_info.verified_email,
            name: user_info.name,
            picture_url: user_info.picture,
        };

        Ok((identity, token_data.refresh_token))
    }
}

/// Reconciles an external identity assertion with locally-stored accounts
/// and hands back an authenticated session.
///
/// Email is the join key when no linked account exists yet; once one does,
/// (provider, subject) is authoritative, since the external email may
/// change without re-linking.
pub struct OauthReconciler {
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    signer: SessionSigner,
    session_ttl: chrono::Duration,
}

impl OauthReconciler {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        signer: SessionSigner,
        session_ttl: chrono::Duration,
    ) -> Self {
        Self {
            identities,
            sessions,
            notifier,
            signer,
            session_ttl,
        }
    }

    pub async fn reconcile(
        &self,
        provider: Provider,
        identity: ExternalIdentity,
        refresh_token: Option<String>,
        metadata: &ClientMetadata,
    ) -> Result<AuthSuccess, AuthError> {
        if !identity.email_verified {
            return Err(AuthError::UnverifiedExternalEmail);
        }

        // Linked account wins over the email join
        if let Some(account) = self
            .identities
            .find_account(provider, &identity.subject_id)
            .await?
        {
            let user = self
                .identities
                .find_user_by_id(account.user_id)
                .await?
                .ok_or(AuthError::NotFound)?;

            if user.is_banned {
                return Err(AuthError::Banned);
            }

            if let Some(refresh) = refresh_token.as_deref() {
                self.identities
                    .update_account_refresh_token(account.account_id, refresh)
                    .await?;
            }

            if !account.email.eq_ignore_ascii_case(&user.primary_email) {
                // Best effort; a delivery failure must not fail the sign-in
                let notifier = Arc::clone(&self.notifier);
                let to = user.primary_email.clone();
                let account_email = user.primary_email.clone();
                let external_email = account.email.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifier
                        .send_mismatch_email(&to, &account_email, &external_email, provider)
                        .await
                    {
                        tracing::warn!(error = ?e, "Failed to send email-mismatch notice");
                    }
                });
            }

            tracing::info!(user_id = %user.user_id, provider = %provider.as_str(), "External sign-in via linked account");
            return self.open_session(user, metadata).await;
        }

        // No linked account yet: join on email
        if let Some(user) = self.identities.find_user_by_email(&identity.email).await? {
            if user.is_banned {
                return Err(AuthError::Banned);
            }

            let account = LinkedAccount::new(
                user.user_id,
                provider,
                identity.subject_id.clone(),
                identity.email.clone(),
                refresh_token,
            );
            self.identities.link_account(&account).await?;

            tracing::info!(user_id = %user.user_id, provider = %provider.as_str(), "Linked external identity to existing user");
            return self.open_session(user, metadata).await;
        }

        // Brand-new identity: user and first account land atomically
        let user = User::from_external_identity(
            provider,
            identity.email.clone(),
            identity.name.clone(),
            identity.picture_url.clone(),
        );
        let account = LinkedAccount::new(
            user.user_id,
            provider,
            identity.subject_id.clone(),
            identity.email.clone(),
            refresh_token,
        );
        self.identities
            .create_user_with_account(&user, &account)
            .await?;

        tracing::info!(user_id = %user.user_id, provider = %provider.as_str(), "Created user from external identity");
        self.open_session(user, metadata).await
    }

    async fn open_session(
        &self,
        user: User,
        metadata: &ClientMetadata,
    ) -> Result<AuthSuccess, AuthError> {
        let session = self
            .sessions
            .create_session(user.user_id, metadata, self.session_ttl)
            .await?;
        let token = self.signer.sign(&session)?;

        Ok(AuthSuccess {
            token,
            user: user.sanitized(),
        })
    }
}
