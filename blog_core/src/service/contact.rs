use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zel_core::prelude::*;

use crate::{
    error::{BlogError, BlogResult},
    mailer::{self, Mailer, OutgoingMail},
    service::accounts::normalize_email,
};

const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Forwards contact form messages to the site's inbox.
#[derive(Clone)]
pub struct ContactService {
    inbox: String,
    mailer: Arc<dyn Mailer>,
}

impl ContactService {
    pub fn new(inbox: String, mailer: Arc<dyn Mailer>) -> Self {
        Self { inbox, mailer }
    }

    /// Every field is required. Delivery is best effort: a transport failure
    /// is logged and the sender still gets a success.
    pub async fn _send_message(&self, input: ContactMessage) -> BlogResult<()> {
        let name = input.name.trim();
        let message = input.message.trim();
        if name.is_empty() || message.is_empty() || input.email.trim().is_empty() {
            return Err(BlogError::validation("name, email and message are required"));
        }
        let email = normalize_email(&input.email)?;
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(BlogError::validation(format!(
                "message must be at most {MAX_MESSAGE_LEN} characters"
            )));
        }

        mailer::deliver(
            self.mailer.as_ref(),
            OutgoingMail {
                to: self.inbox.clone(),
                subject: format!("New contact message from {name}"),
                body: format!("From: {name} <{email}>\n\nMessage:\n{message}"),
            },
        )
        .await;
        tracing::info!(from = %email, "contact message received");
        Ok(())
    }
}

#[zel_service(name = "contact")]
trait Contact {
    #[doc = "Send a message to the site owners"]
    #[method(name = "send_message")]
    async fn send_message(&self, message: ContactMessage) -> Result<(), ResourceError>;
}

#[async_trait]
impl ContactServer for ContactService {
    async fn send_message(&self, _ctx: RequestContext, message: ContactMessage) -> Result<(), ResourceError> {
        Ok(self._send_message(message).await?)
    }
}
