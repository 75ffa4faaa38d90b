use serde::Deserialize;
use std::env;

use crate::services::{auth::AuthTtls, AuthError};

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub google: GoogleConfig,
    /// HS256 secret for signing credential artifacts. Explicit
    /// configuration value; no ambient key material.
    pub signer_secret: String,
    pub lifetimes: LifetimeConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifetimeConfig {
    pub email_verify_minutes: i64,
    pub password_reset_minutes: i64,
    pub twofa_login_minutes: i64,
    pub session_days: i64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AuthError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AuthError::Config(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("auth-core"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: get_env("SMTP_PORT", Some("587"), is_prod)?
                    .parse()
                    .unwrap_or(587),
                user: get_env("SMTP_USER", None, is_prod)?,
                password: get_env("SMTP_PASSWORD", None, is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", None, is_prod)?,
            },
            google: GoogleConfig {
                client_id: get_env("GOOGLE_CLIENT_ID", None, is_prod)?,
                client_secret: get_env("GOOGLE_CLIENT_SECRET", None, is_prod)?,
                redirect_uri: get_env("GOOGLE_REDIRECT_URI", None, is_prod)?,
            },
            signer_secret: get_env("SIGNER_SECRET", None, is_prod)?,
            lifetimes: LifetimeConfig {
                email_verify_minutes: get_env("EMAIL_VERIFY_TTL_MINUTES", Some("15"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AuthError::Config(anyhow::anyhow!(e.to_string()))
                    })?,
                password_reset_minutes: get_env(
                    "PASSWORD_RESET_TTL_MINUTES",
                    Some("15"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AuthError::Config(anyhow::anyhow!(e.to_string()))
                })?,
                twofa_login_minutes: get_env("TWOFA_LOGIN_TTL_MINUTES", Some("10"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AuthError::Config(anyhow::anyhow!(e.to_string()))
                    })?,
                session_days: get_env("SESSION_TTL_DAYS", Some("7"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AuthError::Config(anyhow::anyhow!(e.to_string()))
                    })?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn ttls(&self) -> AuthTtls {
        AuthTtls {
            email_verify: chrono::Duration::minutes(self.lifetimes.email_verify_minutes),
            password_reset: chrono::Duration::minutes(self.lifetimes.password_reset_minutes),
            twofa_login: chrono::Duration::minutes(self.lifetimes.twofa_login_minutes),
            session: chrono::Duration::days(self.lifetimes.session_days),
        }
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.lifetimes.email_verify_minutes <= 0
            || self.lifetimes.password_reset_minutes <= 0
            || self.lifetimes.twofa_login_minutes <= 0
        {
            return Err(AuthError::Config(anyhow::anyhow!(
                "token TTLs must be positive"
            )));
        }

        if self.lifetimes.session_days <= 0 {
            return Err(AuthError::Config(anyhow::anyhow!(
                "SESSION_TTL_DAYS must be positive"
            )));
        }

        if self.environment == Environment::Prod && self.signer_secret.len() < 32 {
            return Err(AuthError::Config(anyhow::anyhow!(
                "SIGNER_SECRET must be at least 32 bytes in production"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AuthError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AuthError::Config(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AuthError::Config(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_nonpositive_ttls() {
        let config = AuthConfig {
            environment: Environment::Dev,
            service_name: "auth-core".to_string(),
            log_level: "info".to_string(),
            database: DatabaseConfig {
                url: "postgres://localhost/auth".to_string(),
                max_connections: 10,
            },
            smtp: SmtpConfig {
                host: "smtp.example.com".to_string(),
                port: 587,
                user: "user".to_string(),
                password: "pass".to_string(),
                from_email: "noreply@example.com".to_string(),
            },
            google: GoogleConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "http://localhost/cb".to_string(),
            },
            signer_secret: "test-secret".to_string(),
            lifetimes: LifetimeConfig {
                email_verify_minutes: 0,
                password_reset_minutes: 15,
                twofa_login_minutes: 10,
                session_days: 7,
            },
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prod_requires_long_signer_secret() {
        let mut config = AuthConfig {
            environment: Environment::Prod,
            service_name: "auth-core".to_string(),
            log_level: "info".to_string(),
            database: DatabaseConfig {
                url: "postgres://localhost/auth".to_string(),
                max_connections: 10,
            },
            smtp: SmtpConfig {
                host: "smtp.example.com".to_string(),
                port: 587,
                user: "user".to_string(),
                password: "pass".to_string(),
                from_email: "noreply@example.com".to_string(),
            },
            google: GoogleConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "http://localhost/cb".to_string(),
            },
            signer_secret: "short".to_string(),
            lifetimes: LifetimeConfig {
                email_verify_minutes: 15,
                password_reset_minutes: 15,
                twofa_login_minutes: 10,
                session_days: 7,
            },
        };

        assert!(config.validate().is_err());

        config.signer_secret = "0123456789abcdef0123456789abcdef".to_string();
        assert!(config.validate().is_ok());
    }
}
