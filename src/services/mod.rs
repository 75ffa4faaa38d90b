pub mod auth;
pub mod email;
pub mod error;
pub mod oauth;
pub mod signer;

pub use auth::{AuthService, AuthSuccess, AuthTtls, SignInOutcome};
pub use email::{MockNotifier, Notifier, SentEmail, SmtpNotifier};
pub use error::AuthError;
pub use oauth::{
    ExternalIdentity, GoogleOauthClient, IdentityProviderClient, OauthReconciler,
};
pub use signer::{SessionClaims, SessionSigner};
