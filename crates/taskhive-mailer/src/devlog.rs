//! Development transport — captures emails instead of sending them.
//!
//! Each send appends a record to a JSON-array log file and prints a
//! human-readable trace to the console. The log can be read back (last N
//! records) and cleared, which is what the `mail-log` CLI subcommand and the
//! end-to-end tests use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use taskhive_core::error::{Result, TaskHiveError};

use crate::transport::MailTransport;

/// One captured email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailRecord {
    pub timestamp: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub status: String,
}

/// Development mail transport backed by an append-only JSON log file.
pub struct DevMailer {
    log_file: PathBuf,
    /// Serializes the read-modify-write of the log file.
    lock: Mutex<()>,
}

impl DevMailer {
    pub fn new(log_file: PathBuf) -> Self {
        Self {
            log_file,
            lock: Mutex::new(()),
        }
    }

    fn load_records(&self) -> Result<Vec<MailRecord>> {
        if !self.log_file.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.log_file)?;
        serde_json::from_str(&content)
            .map_err(|e| TaskHiveError::Transport(format!("Corrupt mail log: {e}")))
    }

    fn append_record(&self, record: MailRecord) -> Result<()> {
        let _guard = self.lock.lock().map_err(|e| {
            TaskHiveError::Transport(format!("Mail log lock poisoned: {e}"))
        })?;
        if let Some(parent) = self.log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut records = self.load_records()?;
        records.push(record);
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| TaskHiveError::Transport(format!("Serialize mail log: {e}")))?;
        std::fs::write(&self.log_file, json)?;
        Ok(())
    }

    /// Last `limit` captured emails, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<MailRecord>> {
        let records = self.load_records()?;
        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }

    /// Remove the log file.
    pub fn clear(&self) -> Result<()> {
        if self.log_file.exists() {
            std::fs::remove_file(&self.log_file)?;
        }
        Ok(())
    }
}

#[async_trait]
impl MailTransport for DevMailer {
    fn name(&self) -> &str {
        "dev-log"
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let record = MailRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            status: "logged_for_development".to_string(),
        };

        tracing::info!(
            "📧 EMAIL CAPTURED (development mode)\n  To: {to}\n  Subject: {subject}\n  Body:\n{body}"
        );

        self.append_record(record)
    }
}
