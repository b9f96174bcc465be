//! # Stagehand Common Library
//!
//! Shared code for the Stagehand theatre back-office service:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Database initialization, migrations and settings
//! - Authentication primitives (password hashing, JWT, roles)
//! - Pagination and recurrence rule expansion
//! - Time helpers

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod pagination;
pub mod recurrence;
pub mod time;

pub use error::{Error, Result};
pub use recurrence::RecurrenceRule;
