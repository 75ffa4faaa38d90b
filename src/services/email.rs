use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    Message,
    SmtpTransport,
    Transport,
};
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::models::Provider;
use crate::services::AuthError;

/// Outbound mail seam. The orchestrator only ever talks to this trait;
/// tests substitute a recording mock.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a one-time code with a purpose-specific title and lead-in.
    async fn send_otp_email(
        &self,
        to_email: &str,
        title: &str,
        description: &str,
        otp: &str,
    ) -> Result<(), AuthError>;

    /// Notify the address on file that an external sign-in used a
    /// different email than the linked account recorded. Best effort.
    async fn send_mismatch_email(
        &self,
        to_email: &str,
        account_email: &str,
        external_email: &str,
        provider: Provider,
    ) -> Result<(), AuthError>;
}

#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, AuthError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "SMTP notifier initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), AuthError> {
        let email = Message::builder()
            .from(self.from_email.parse().map_err(
                |e: lettre::address::AddressError| AuthError::Internal(e.into()),
            )?)
            .to(to_email.parse().map_err(
                |e: lettre::address::AddressError| AuthError::Internal(e.into()),
            )?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AuthError::Internal(e.into()))?;

        // Send in the blocking pool; the SMTP transport is synchronous
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AuthError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(
                    to = %to_email,
                    subject = %subject,
                    "Email sent successfully"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e.to_string(),
                    to = %to_email,
                    "Failed to send email"
                );
                Err(AuthError::Delivery(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_otp_email(
        &self,
        to_email: &str,
        title: &str,
        description: &str,
        otp: &str,
    ) -> Result<(), AuthError> {
        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>{}</h2>
                    <p>{}</p>
                    <p style="font-size: 32px; font-weight: bold; letter-spacing: 8px;">
                        {}
                    </p>
                    <p style="color: #666; font-size: 12px;">
                        If you didn't request this, please ignore this email.
                    </p>
                </body>
            </html>
            "###,
            title, description, otp
        );

        let plain_body = format!(
            "{}\n\n{}\n\nYour code: {}\n\nIf you didn't request this, please ignore this email.",
            title, description, otp
        );

        self.send_email(to_email, title, &plain_body, &html_body).await
    }

    async fn send_mismatch_email(
        &self,
        to_email: &str,
        account_email: &str,
        external_email: &str,
        provider: Provider,
    ) -> Result<(), AuthError> {
        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Sign-in email changed</h2>
                    <p>
                        A recent {} sign-in to your account used the address
                        <strong>{}</strong>, while your account is registered under
                        <strong>{}</strong>. If this wasn't you, please review your
                        account security.
                    </p>
                </body>
            </html>
            "###,
            provider.as_str(),
            external_email,
            account_email
        );

        let plain_body = format!(
            "Sign-in email changed\n\nA recent {} sign-in to your account used the address {}, while your account is registered under {}. If this wasn't you, please review your account security.",
            provider.as_str(),
            external_email,
            account_email
        );

        self.send_email(to_email, "Sign-in email changed", &plain_body, &html_body)
            .await
    }
}

/// Recording mock for tests. Captures every message and can be switched
/// into a failing mode to exercise rollback paths.
#[derive(Default)]
pub struct MockNotifier {
    sent: std::sync::Mutex<Vec<SentEmail>>,
    fail: std::sync::atomic::AtomicBool,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub otp: Option<String>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_otp(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|m| m.otp.clone())
    }

    fn check_failing(&self) -> Result<(), AuthError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            Err(AuthError::Delivery("mock delivery failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_otp_email(
        &self,
        to_email: &str,
        title: &str,
        _description: &str,
        otp: &str,
    ) -> Result<(), AuthError> {
        self.check_failing()?;
        self.sent.lock().unwrap().push(SentEmail {
            to: to_email.to_string(),
            subject: title.to_string(),
            otp: Some(otp.to_string()),
        });
        Ok(())
    }

    async fn send_mismatch_email(
        &self,
        to_email: &str,
        _account_email: &str,
        _external_email: &str,
        _provider: Provider,
    ) -> Result<(), AuthError> {
        self.check_failing()?;
        self.sent.lock().unwrap().push(SentEmail {
            to: to_email.to_string(),
            subject: "Sign-in email changed".to_string(),
            otp: None,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_otp_messages() {
        let notifier = MockNotifier::new();
        notifier
            .send_otp_email("a@example.com", "Verify your email", "Use this code:", "123456")
            .await
            .unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@example.com");
        assert_eq!(notifier.last_otp().as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn test_mock_failing_mode_returns_delivery_error() {
        let notifier = MockNotifier::new();
        notifier.set_failing(true);

        let err = notifier
            .send_otp_email("a@example.com", "Verify your email", "Use this code:", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Delivery(_)));
        assert!(notifier.sent().is_empty());
    }
}
