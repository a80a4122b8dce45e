use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// Outbound mail channel. Implementations own the transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Logs mails instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "outgoing mail");
        tracing::debug!(body = %mail.body, "outgoing mail body");
        Ok(())
    }
}

/// Sends `mail`, downgrading failures to a warning.
pub async fn deliver(mailer: &dyn Mailer, mail: OutgoingMail) {
    let to = mail.to.clone();
    if let Err(error) = mailer.send(mail).await {
        tracing::warn!(%to, %error, "mail delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingMailer, RecordingMailer};

    fn mail() -> OutgoingMail {
        OutgoingMail {
            to: "ana@example.com".to_string(),
            subject: "Hola".to_string(),
            body: "...".to_string(),
        }
    }

    #[tokio::test]
    async fn test_deliver_hands_mail_to_transport() {
        let mailer = RecordingMailer::default();
        deliver(&mailer, mail()).await;
        assert_eq!(mailer.sent(), vec![mail()]);
    }

    #[tokio::test]
    async fn test_deliver_swallows_transport_errors() {
        deliver(&FailingMailer, mail()).await;
        assert!(TracingMailer.send(mail()).await.is_ok());
    }
}
