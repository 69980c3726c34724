//! Production SMTP transport (async lettre).
//!
//! Every send opens a fresh STARTTLS session, authenticates, delivers one
//! message, and drops the connection. No pooling — correctness over
//! efficiency at this email volume.

use async_trait::async_trait;

use taskhive_core::config::SmtpConfig;
use taskhive_core::error::{Result, TaskHiveError};

use crate::transport::MailTransport;

/// SMTP relay transport.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message, message::Mailbox,
            message::header::ContentType, transport::smtp::authentication::Credentials,
        };

        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.sender_name, self.config.username)
                .parse()
                .map_err(|e| TaskHiveError::Transport(format!("Invalid from: {e}")))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| TaskHiveError::Transport(format!("Invalid to: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| TaskHiveError::Transport(format!("Build email: {e}")))?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );

        let mailer = AsyncSmtpTransport::<lettre::Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| TaskHiveError::Transport(format!("SMTP relay: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| TaskHiveError::Transport(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {to}");
        Ok(())
    }
}
