//! Mail transport trait and process-start selection.

use async_trait::async_trait;
use std::sync::Arc;

use taskhive_core::TaskHiveConfig;
use taskhive_core::error::Result;

use crate::devlog::DevMailer;
use crate::smtp::SmtpMailer;

/// A way to deliver one email. Implementations must be safe to share with
/// the single consumer task.
#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one message. Fails with `TaskHiveError::Transport` when the
    /// underlying channel is unavailable or rejects the message.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Pick the transport once at process start: real SMTP when credentials are
/// configured, the development logger otherwise.
pub fn select_transport(config: &TaskHiveConfig) -> Arc<dyn MailTransport> {
    if config.smtp.is_configured() {
        tracing::info!("📮 Mail transport: SMTP relay {}", config.smtp.host);
        Arc::new(SmtpMailer::new(config.smtp.clone()))
    } else {
        tracing::info!(
            "📮 Mail transport: development log ({})",
            config.mail_log.log_file().display()
        );
        Arc::new(DevMailer::new(config.mail_log.log_file()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_by_credentials() {
        let mut config = TaskHiveConfig::default();
        assert_eq!(select_transport(&config).name(), "dev-log");

        config.smtp.username = "mailer@example.com".into();
        config.smtp.password = "app-password".into();
        assert_eq!(select_transport(&config).name(), "smtp");
    }
}
