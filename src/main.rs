//! # TaskHive — Task Management Backend
//!
//! Role-based task/project management with automated email notifications.
//!
//! Usage:
//!   taskhive serve                  # Start the API server
//!   taskhive serve --port 8080      # Custom port
//!   taskhive mail-log --last 5      # Show recently captured dev emails
//!   taskhive mail-log --clear       # Clear the dev email log

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taskhive_core::TaskHiveConfig;
use taskhive_mailer::DevMailer;

#[derive(Parser)]
#[command(
    name = "taskhive",
    version,
    about = "🐝 TaskHive — task management backend with smart email notifications"
)]
struct Cli {
    /// Path to config file (default: ~/.taskhive/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the API server (default)
    Serve {
        /// Bind host override
        #[arg(long)]
        host: Option<String>,
        /// Bind port override
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect the development email log
    MailLog {
        /// Show the last N captured emails
        #[arg(long, default_value = "10")]
        last: usize,
        /// Clear the log instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

fn load_config(cli: &Cli) -> Result<TaskHiveConfig> {
    match &cli.config {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            let mut config = TaskHiveConfig::load_from(std::path::Path::new(&expanded))?;
            config.apply_env();
            Ok(config)
        }
        None => Ok(TaskHiveConfig::load()?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "taskhive=debug,tower_http=debug"
    } else {
        "taskhive=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if config.auth.jwt_secret == "taskhive-dev-secret" {
                tracing::warn!(
                    "⚠️ Using the DEFAULT JWT secret! Set JWT_SECRET for production."
                );
            }
            taskhive_gateway::start(config).await
        }
        Command::MailLog { last, clear } => {
            let viewer = DevMailer::new(config.mail_log.log_file());
            if clear {
                viewer.clear()?;
                println!("Email log cleared!");
                return Ok(());
            }
            let records = viewer.recent(last)?;
            if records.is_empty() {
                println!("No emails found in log.");
                return Ok(());
            }
            println!("\n📧 Last {} Email(s) Captured:", records.len());
            println!("{}", "=".repeat(50));
            for (i, record) in records.iter().enumerate() {
                let preview: String = record.body.chars().take(100).collect();
                println!("\n{}. [{}]", i + 1, record.timestamp);
                println!("   To: {}", record.to);
                println!("   Subject: {}", record.subject);
                println!("   Body Preview: {preview}...");
                println!("{}", "-".repeat(50));
            }
            Ok(())
        }
    }
}
