//! Test harness: the full service wired against the in-memory store, a
//! recording notifier, and a fixed OTP source.

#![allow(dead_code)]

use std::sync::Arc;

use auth_core::services::{
    AuthService, AuthSuccess, AuthTtls, MockNotifier, OauthReconciler, SessionSigner,
};
use auth_core::store::MemoryStore;
use auth_core::utils::{ClientMetadata, FixedOtpGenerator, Password};

pub const TEST_OTP: &str = "123456";
pub const TEST_SIGNER_SECRET: &str = "integration-test-signer-secret";

pub struct TestHarness {
    pub auth: AuthService,
    pub reconciler: OauthReconciler,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MockNotifier>,
    pub signer: SessionSigner,
}

pub fn harness() -> TestHarness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(MockNotifier::new());
    let signer = SessionSigner::new(TEST_SIGNER_SECRET);
    let ttls = AuthTtls::default();

    let auth = AuthService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        Arc::new(FixedOtpGenerator(TEST_OTP.to_string())),
        signer.clone(),
        ttls.clone(),
    );

    let reconciler = OauthReconciler::new(
        store.clone(),
        store.clone(),
        notifier.clone(),
        signer.clone(),
        ttls.session,
    );

    TestHarness {
        auth,
        reconciler,
        store,
        notifier,
        signer,
    }
}

pub fn metadata() -> ClientMetadata {
    ClientMetadata {
        ip: "203.0.113.7".to_string(),
        user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
        os: "Linux".to_string(),
    }
}

pub fn otp() -> Password {
    Password::new(TEST_OTP.to_string())
}

pub fn password(s: &str) -> Password {
    Password::new(s.to_string())
}

/// Run a complete registration for `email` and return the sign-in result.
pub async fn register_user(h: &TestHarness, email: &str, pw: &str) -> AuthSuccess {
    let issued = h.auth.initialize(email).await.expect("initialize failed");
    h.auth
        .complete_registration(issued.token_id, &otp(), "Test User", &password(pw), &metadata())
        .await
        .expect("complete_registration failed")
}
