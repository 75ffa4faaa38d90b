//! Authentication core: user provisioning, OTP email challenges, session
//! credentials, and OAuth identity reconciliation.
//!
//! The crate is the core behind an HTTP boundary: callers hand in
//! already-validated input and client metadata, and get back typed results
//! or an [`services::AuthError`]. Storage sits behind the repository
//! traits in [`store`]; outbound mail behind [`services::Notifier`].

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::AuthConfig;
pub use services::{
    AuthError, AuthService, AuthSuccess, AuthTtls, OauthReconciler, SessionSigner, SignInOutcome,
};
pub use store::{IdentityStore, MemoryStore, PgStore, SessionStore, TokenStore};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and tools embedding the core.
/// `RUST_LOG` overrides the configured level.
pub fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
