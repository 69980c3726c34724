//! # TaskHive DB
//!
//! SQLite persistence for users, projects, and tasks.
//!
//! One `Store` per process, shared behind `Arc`. Each operation takes the
//! connection lock, runs its statements, and releases on every exit path —
//! request handlers and scanner jobs get independent units of work with no
//! cross-operation transaction between them.

mod store;

pub use store::Store;
