use thiserror::Error;

/// Failure kinds surfaced by the auth core.
///
/// Validation-shaped outcomes are expected results returned to the caller;
/// infrastructure failures wrap their source and are logged at the failure
/// site without leaking internals through `Display`.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Token expired")]
    Expired,

    /// Uniform wording for bad password and bad OTP alike, so callers
    /// cannot distinguish which check failed (account enumeration defense).
    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Email not verified")]
    NotVerified,

    #[error("Account is banned")]
    Banned,

    #[error("User must sign in with their provider")]
    WrongProvider,

    #[error("External identity email is not verified")]
    UnverifiedExternalEmail,

    #[error("External provider error")]
    ExternalProvider(#[source] anyhow::Error),

    #[error("Email delivery failed")]
    Delivery(String),

    #[error("Database error")]
    Database(#[source] anyhow::Error),

    #[error("Configuration error")]
    Config(#[source] anyhow::Error),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    /// Whether this is an expected validation outcome rather than an
    /// infrastructure failure.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            AuthError::ExternalProvider(_)
                | AuthError::Delivery(_)
                | AuthError::Database(_)
                | AuthError::Config(_)
                | AuthError::Internal(_)
        )
    }

    /// Collapse into `Internal`, for failure paths where a finer kind must
    /// not escape (e.g. after a token has already been spent).
    pub fn into_internal(self) -> AuthError {
        match self {
            AuthError::Internal(e) => AuthError::Internal(e),
            other => AuthError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Database(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credential_wording_is_uniform() {
        // Single message for every credential failure path
        assert_eq!(AuthError::InvalidCredential.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_infra_errors_are_not_validation() {
        assert!(AuthError::NotFound.is_validation());
        assert!(AuthError::Banned.is_validation());
        assert!(!AuthError::Database(anyhow::anyhow!("boom")).is_validation());
        assert!(!AuthError::Delivery("smtp down".to_string()).is_validation());
    }

    #[test]
    fn test_display_does_not_leak_source() {
        let err = AuthError::Database(anyhow::anyhow!("password=hunter2 in DSN"));
        assert_eq!(err.to_string(), "Database error");
    }
}
