mod common;

use auth_core::services::{AuthError, SignInOutcome};
use auth_core::utils::Password;
use common::{harness, metadata, otp, password, register_user};

#[tokio::test]
async fn test_password_reset_flow() {
    let h = harness();
    let success = register_user(&h, "alice@example.com", "old-pass").await;
    let user_id = success.user.user_id;

    // A second live session to confirm the bulk invalidation
    h.auth
        .sign_in("alice@example.com", &password("old-pass"), &metadata())
        .await
        .unwrap();
    assert_eq!(h.store.session_count(user_id), 2);

    let issued = h
        .auth
        .request_password_reset("alice@example.com", &metadata())
        .await
        .unwrap();
    assert_eq!(h.notifier.last_otp().as_deref(), Some(common::TEST_OTP));

    h.auth
        .reset_password(issued.token_id, &otp(), &password("new-pass"))
        .await
        .unwrap();

    // Every pre-existing session is gone; old artifacts stop resolving
    assert_eq!(h.store.session_count(user_id), 0);
    assert!(matches!(
        h.auth.authenticate(&success.token).await.unwrap_err(),
        AuthError::InvalidCredential
    ));

    // Old password out, new password in
    assert!(matches!(
        h.auth
            .sign_in("alice@example.com", &password("old-pass"), &metadata())
            .await
            .unwrap_err(),
        AuthError::InvalidCredential
    ));
    let outcome = h
        .auth
        .sign_in("alice@example.com", &password("new-pass"), &metadata())
        .await
        .unwrap();
    assert!(matches!(outcome, SignInOutcome::Authenticated(_)));
}

#[tokio::test]
async fn test_reset_request_validation() {
    let h = harness();

    let err = h
        .auth
        .request_password_reset("nobody@example.com", &metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));

    // Provisional users have not proven the email yet
    h.auth.initialize("bob@example.com").await.unwrap();
    let err = h
        .auth
        .request_password_reset("bob@example.com", &metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotVerified));

    let success = register_user(&h, "alice@example.com", "s3cret-pass").await;
    h.store.ban_user(success.user.user_id);
    let err = h
        .auth
        .request_password_reset("alice@example.com", &metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Banned));
}

#[tokio::test]
async fn test_ban_between_request_and_reset_blocks_completion() {
    let h = harness();
    let success = register_user(&h, "alice@example.com", "old-pass").await;
    let user_id = success.user.user_id;

    let issued = h
        .auth
        .request_password_reset("alice@example.com", &metadata())
        .await
        .unwrap();

    // The ban lands after the token was issued but before it is spent
    h.store.ban_user(user_id);

    let err = h
        .auth
        .reset_password(issued.token_id, &otp(), &password("new-pass"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Banned));

    // Sessions are untouched; no password write happened
    assert_eq!(h.store.session_count(user_id), 1);
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let h = harness();
    register_user(&h, "alice@example.com", "old-pass").await;

    let issued = h
        .auth
        .request_password_reset("alice@example.com", &metadata())
        .await
        .unwrap();

    h.auth
        .reset_password(issued.token_id, &otp(), &password("new-pass"))
        .await
        .unwrap();

    let err = h
        .auth
        .reset_password(issued.token_id, &otp(), &password("newer-pass"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}

#[tokio::test]
async fn test_wrong_otp_leaves_reset_token_usable() {
    let h = harness();
    register_user(&h, "alice@example.com", "old-pass").await;

    let issued = h
        .auth
        .request_password_reset("alice@example.com", &metadata())
        .await
        .unwrap();

    let err = h
        .auth
        .reset_password(
            issued.token_id,
            &Password::new("000000".to_string()),
            &password("new-pass"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredential));

    assert!(h
        .auth
        .reset_password(issued.token_id, &otp(), &password("new-pass"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_registration_token_cannot_reset_password() {
    let h = harness();
    let issued = h.auth.initialize("alice@example.com").await.unwrap();

    // Scope mismatch reads as an unknown token
    let err = h
        .auth
        .reset_password(issued.token_id, &otp(), &password("new-pass"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}
