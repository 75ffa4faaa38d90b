mod common;

use auth_core::services::AuthError;
use auth_core::utils::Password;
use common::{harness, metadata, otp, password, register_user, TEST_OTP};

#[tokio::test]
async fn test_registration_happy_path() {
    let h = harness();

    let issued = h.auth.initialize("alice@example.com").await.unwrap();
    assert!(issued.expires_utc > chrono::Utc::now());

    // The OTP travels only through the notifier
    assert_eq!(h.notifier.last_otp().as_deref(), Some(TEST_OTP));
    assert_eq!(h.notifier.sent()[0].to, "alice@example.com");

    let success = h
        .auth
        .complete_registration(
            issued.token_id,
            &otp(),
            "Alice",
            &password("s3cret-pass"),
            &metadata(),
        )
        .await
        .unwrap();

    assert_eq!(success.user.primary_email, "alice@example.com");
    assert_eq!(success.user.display_name.as_deref(), Some("Alice"));
    assert!(success.user.is_verified);

    // The artifact resolves back to the user
    let resolved = h.auth.authenticate(&success.token).await.unwrap();
    assert_eq!(resolved.user_id, success.user.user_id);
}

#[tokio::test]
async fn test_initialize_rejects_taken_email() {
    let h = harness();
    register_user(&h, "alice@example.com", "s3cret-pass").await;

    let err = h.auth.initialize("alice@example.com").await.unwrap_err();
    assert!(matches!(err, AuthError::AlreadyExists(_)));

    // Case-insensitive
    let err = h.auth.initialize("ALICE@example.com").await.unwrap_err();
    assert!(matches!(err, AuthError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_initialize_rolls_back_user_on_delivery_failure() {
    let h = harness();
    h.notifier.set_failing(true);

    let err = h.auth.initialize("alice@example.com").await.unwrap_err();
    assert!(matches!(err, AuthError::Delivery(_)));

    // No orphaned reservation; the email is usable again
    assert_eq!(h.store.user_count(), 0);
    h.notifier.set_failing(false);
    assert!(h.auth.initialize("alice@example.com").await.is_ok());
}

#[tokio::test]
async fn test_wrong_otp_allows_retry() {
    let h = harness();
    let issued = h.auth.initialize("alice@example.com").await.unwrap();

    let err = h
        .auth
        .complete_registration(
            issued.token_id,
            &Password::new("000000".to_string()),
            "Alice",
            &password("s3cret-pass"),
            &metadata(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredential));

    // The token survives a wrong guess
    assert!(h
        .auth
        .complete_registration(
            issued.token_id,
            &otp(),
            "Alice",
            &password("s3cret-pass"),
            &metadata(),
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn test_spent_token_cannot_be_replayed() {
    let h = harness();
    let issued = h.auth.initialize("alice@example.com").await.unwrap();

    h.auth
        .complete_registration(
            issued.token_id,
            &otp(),
            "Alice",
            &password("s3cret-pass"),
            &metadata(),
        )
        .await
        .unwrap();

    let err = h
        .auth
        .complete_registration(
            issued.token_id,
            &otp(),
            "Alice",
            &password("other-pass"),
            &metadata(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let h = harness();
    let issued = h.auth.initialize("alice@example.com").await.unwrap();
    h.store.force_expire_token(issued.token_id);

    let err = h
        .auth
        .complete_registration(
            issued.token_id,
            &otp(),
            "Alice",
            &password("s3cret-pass"),
            &metadata(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Expired));
}

#[tokio::test]
async fn test_resend_issues_independent_token() {
    let h = harness();
    let first = h.auth.initialize("alice@example.com").await.unwrap();

    let second = h
        .auth
        .resend_email_verification("alice@example.com")
        .await
        .unwrap();
    assert_ne!(first.token_id, second.token_id);

    // The earlier token stays live; either one completes the registration
    assert!(h
        .auth
        .complete_registration(
            first.token_id,
            &otp(),
            "Alice",
            &password("s3cret-pass"),
            &metadata(),
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn test_resend_validation() {
    let h = harness();

    let err = h
        .auth
        .resend_email_verification("nobody@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));

    register_user(&h, "alice@example.com", "s3cret-pass").await;
    let err = h
        .auth
        .resend_email_verification("alice@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AlreadyExists(_)));

    h.auth.initialize("bob@example.com").await.unwrap();
    let bob = h
        .store
        .user_id_by_email("bob@example.com")
        .expect("bob exists");
    h.store.ban_user(bob);
    let err = h
        .auth
        .resend_email_verification("bob@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Banned));
}

#[tokio::test]
async fn test_purge_removes_expired_tokens() {
    let h = harness();
    let stale = h.auth.initialize("alice@example.com").await.unwrap();
    h.auth.initialize("bob@example.com").await.unwrap();
    h.store.force_expire_token(stale.token_id);

    assert_eq!(h.auth.purge_expired_tokens().await.unwrap(), 1);
    assert_eq!(h.auth.purge_expired_tokens().await.unwrap(), 0);
}
