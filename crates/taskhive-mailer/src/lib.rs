//! # TaskHive Mailer
//!
//! The asynchronous email notification subsystem.
//!
//! ## Architecture
//! ```text
//! route handlers / scanner jobs
//!   └── Notifier (composes subject/body from store snapshots)
//!         └── Mailer::enqueue — O(1), non-blocking, never fails
//!               └── unbounded mpsc queue
//!                     └── single consumer task
//!                           └── MailTransport::send
//!                                 ├── SmtpMailer (fresh session per send)
//!                                 └── DevMailer  (console + JSON log file)
//! ```
//!
//! Delivery is at-most-once: a failed send is logged and the job dropped.
//! The queue is unbounded — growth under a slow consumer is an accepted
//! open risk, called out rather than fixed.

pub mod compose;
pub mod devlog;
pub mod queue;
pub mod smtp;
pub mod transport;

pub use compose::Notifier;
pub use devlog::{DevMailer, MailRecord};
pub use queue::Mailer;
pub use smtp::SmtpMailer;
pub use transport::{MailTransport, select_transport};
