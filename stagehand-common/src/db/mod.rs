//! Database initialization, schema and settings

pub mod init;
pub mod migrations;
pub mod settings;

pub use init::*;
pub use migrations::run_migrations;
pub use settings::*;
