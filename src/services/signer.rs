use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Session;
use crate::services::AuthError;

/// Signs session records into portable credential artifacts and verifies
/// them back. HS256 over a secret taken from configuration; no ambient
/// key material.
#[derive(Clone)]
pub struct SessionSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// Claims carried by a credential artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Session ID
    pub sid: Uuid,
    /// Subject (user ID)
    pub sub: Uuid,
    /// Expiration time (Unix timestamp), mirrors the session row's expiry
    pub exp: i64,
}

impl SessionSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a session into a credential artifact handed to the client.
    pub fn sign(&self, session: &Session) -> Result<String, AuthError> {
        let claims = SessionClaims {
            sid: session.session_id,
            sub: session.user_id,
            exp: session.expires_utc.timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::Error::new(e)))
    }

    /// Verify an artifact's signature and expiry and return its claims.
    /// Verification alone does not prove the session still exists; callers
    /// holding a `SessionStore` must still look the session up.
    pub fn verify(&self, artifact: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<SessionClaims>(artifact, &self.decoding_key, &validation)
            .map_err(|_| AuthError::InvalidCredential)?;

        Ok(token_data.claims)
    }
}
