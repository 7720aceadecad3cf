use super::{NotifyMessage, Notifier};
use crate::error::NotifyError;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// SMTP timeout for a single delivery.
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    pub to: Vec<String>,
}

impl EmailConfig {
    /// Build a config from a comma-separated recipient list.
    pub fn new(
        smtp_host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        recipients: &str,
    ) -> Self {
        Self {
            smtp_host: smtp_host.into(),
            username: username.into(),
            password: password.into(),
            to: recipients
                .split(',')
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Plain-text email over implicit-TLS SMTP.
pub struct EmailNotifier {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(credentials)
            .timeout(Some(DEFAULT_SMTP_TIMEOUT))
            .build();

        Ok(Self { config, mailer })
    }

    pub fn build_message(&self, message: &NotifyMessage) -> Result<Message, NotifyError> {
        let parse = |address: &str| {
            address
                .parse::<Mailbox>()
                .map_err(|_| NotifyError::Address(address.to_string()))
        };

        if self.config.to.is_empty() {
            return Err(NotifyError::Address(String::new()));
        }

        let mut builder = Message::builder()
            .from(parse(&self.config.username)?)
            .subject(message.title.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.config.to {
            builder = builder.to(parse(recipient)?);
        }

        builder
            .body(message.body.clone())
            .map_err(|error| NotifyError::Message(error.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<(), NotifyError> {
        let email = self.build_message(message)?;
        self.mailer.send(email).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(recipients: &str) -> EmailConfig {
        EmailConfig::new(DEFAULT_SMTP_HOST, "monitor@gmail.com", "app-pass", recipients)
    }

    #[test]
    fn test_recipients_split() {
        let config = config(" a@x.com, b@y.org ,,");
        assert_eq!(config.to, vec!["a@x.com", "b@y.org"]);
    }

    #[tokio::test]
    async fn test_build_message_headers() {
        let notifier = EmailNotifier::new(config("a@x.com,b@y.org")).unwrap();
        let message = NotifyMessage {
            title: "⚠️ BTC Overheat Alert".to_string(),
            body: "details".to_string(),
        };

        let email = notifier.build_message(&message).unwrap();
        let to = email.headers().get_raw("To").unwrap();

        assert!(to.contains("a@x.com"));
        assert!(to.contains("b@y.org"));
        assert_eq!(email.envelope().to().len(), 2);
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_address() {
        let notifier = EmailNotifier::new(config("not an address")).unwrap();
        let message = NotifyMessage {
            title: "t".to_string(),
            body: "b".to_string(),
        };

        assert!(matches!(
            notifier.build_message(&message),
            Err(NotifyError::Address(_))
        ));
    }
}
