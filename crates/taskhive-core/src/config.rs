//! TaskHive configuration system.
//!
//! TOML file with serde-defaulted sections. Secrets (SMTP credentials, JWT
//! signing key) can be overridden by environment variables so a config file
//! never has to hold them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TaskHiveError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHiveConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub mail_log: MailLogConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for TaskHiveConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            smtp: SmtpConfig::default(),
            mail_log: MailLogConfig::default(),
            auth: AuthConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl TaskHiveConfig {
    /// Load config from the default path (~/.taskhive/config.toml), then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path (no environment overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TaskHiveError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TaskHiveError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| TaskHiveError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Environment overrides: SMTP_SERVER, SMTP_PORT, SMTP_USERNAME,
    /// SMTP_PASSWORD, JWT_SECRET.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SMTP_SERVER") {
            self.smtp.host = v;
        }
        if let Ok(v) = std::env::var("SMTP_PORT")
            && let Ok(port) = v.parse()
        {
            self.smtp.port = port;
        }
        if let Ok(v) = std::env::var("SMTP_USERNAME") {
            self.smtp.username = v;
        }
        if let Ok(v) = std::env::var("SMTP_PASSWORD") {
            self.smtp.password = v;
        }
        if let Ok(v) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the TaskHive home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".taskhive")
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "taskhive.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// SMTP relay configuration. Credentials presence selects the production
/// transport; with no credentials the development transport is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_sender_name() -> String {
    "Task Management System".into()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            sender_name: default_sender_name(),
        }
    }
}

impl SmtpConfig {
    /// Whether real SMTP credentials are configured.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Development mail log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailLogConfig {
    #[serde(default = "default_mail_log_dir")]
    pub dir: String,
}

fn default_mail_log_dir() -> String {
    "email_logs".into()
}

impl Default for MailLogConfig {
    fn default() -> Self {
        Self {
            dir: default_mail_log_dir(),
        }
    }
}

impl MailLogConfig {
    /// Path of the append-only JSON log file.
    pub fn log_file(&self) -> PathBuf {
        PathBuf::from(&self.dir).join("sent_emails.json")
    }
}

/// Auth configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

fn default_jwt_secret() -> String {
    "taskhive-dev-secret".into()
}
fn default_token_ttl_hours() -> u64 {
    24
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

/// Scheduler configuration. Defaults match the production schedules:
/// status normalization once a day, reminder sweep daily at 09:00,
/// weekly summaries Monday at 08:00.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the scheduler loop checks for due jobs, in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Interval of the daily status-normalization job, in seconds.
    #[serde(default = "default_normalize_interval")]
    pub normalize_interval_secs: u64,
    /// Cron schedule of the due-date reminder sweep.
    #[serde(default = "default_reminder_cron")]
    pub reminder_cron: String,
    /// Cron schedule of the weekly team-lead summary.
    #[serde(default = "default_summary_cron")]
    pub summary_cron: String,
}

fn default_check_interval() -> u64 {
    30
}
fn default_normalize_interval() -> u64 {
    86_400
}
fn default_reminder_cron() -> String {
    "0 9 * * *".into()
}
fn default_summary_cron() -> String {
    "0 8 * * 1".into()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            normalize_interval_secs: default_normalize_interval(),
            reminder_cron: default_reminder_cron(),
            summary_cron: default_summary_cron(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TaskHiveConfig::default();
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.smtp.port, 587);
        assert!(!config.smtp.is_configured());
        assert_eq!(config.scheduler.reminder_cron, "0 9 * * *");
        assert_eq!(config.scheduler.summary_cron, "0 8 * * 1");
    }

    #[test]
    fn test_smtp_configured() {
        let mut config = TaskHiveConfig::default();
        config.smtp.username = "mailer@example.com".into();
        assert!(!config.smtp.is_configured());
        config.smtp.password = "app-password".into();
        assert!(config.smtp.is_configured());
    }

    #[test]
    fn test_partial_toml() {
        let config: TaskHiveConfig = toml::from_str(
            r#"
            [gateway]
            port = 9000

            [smtp]
            host = "mail.internal"
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.smtp.host, "mail.internal");
        assert_eq!(config.smtp.port, 587);
    }

    #[test]
    fn test_mail_log_file() {
        let config = TaskHiveConfig::default();
        assert_eq!(
            config.mail_log.log_file(),
            PathBuf::from("email_logs").join("sent_emails.json")
        );
    }
}
