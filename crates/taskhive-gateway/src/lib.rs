//! # TaskHive Gateway
//!
//! The HTTP REST API: JWT-authenticated CRUD over users, projects, and
//! tasks, with role-based access (team leads manage, developers act on
//! their assigned tasks). Route handlers hand task events to the notifier;
//! notification outcomes never affect the HTTP response.

pub mod auth;
pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
