//! # TaskHive Core
//!
//! Shared foundation for the TaskHive workspace: configuration, the error
//! taxonomy, and the domain types (users, projects, tasks, email jobs) that
//! every other crate operates on.

pub mod config;
pub mod error;
pub mod types;

pub use config::TaskHiveConfig;
pub use error::{Result, TaskHiveError};
pub use types::{
    EmailJob, Project, ProjectCreate, ProjectPatch, Task, TaskCreate, TaskPatch, TaskStatus, User,
    UserRole,
};
