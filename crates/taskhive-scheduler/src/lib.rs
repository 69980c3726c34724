//! # TaskHive Scheduler
//!
//! Recurring background jobs, detached from request handling.
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio interval loop)
//!   ├── "status-normalization"  interval, daily  → overdue tasks parked as pending
//!   ├── "due-date-reminders"    cron "0 9 * * *" → due-today/tomorrow/overdue emails
//!   └── "weekly-team-summary"   cron "0 8 * * 1" → one summary per team lead
//! ```
//!
//! Jobs are registered by name with an explicit schedule. Each firing is
//! spawned on its own task; a per-job guard skips a firing while the previous
//! one is still running, and a failed run is logged without affecting the
//! job's next schedule or any other job.

pub mod cron;
pub mod job;
pub mod sweeps;

pub use job::{Scheduler, spawn_scheduler};
