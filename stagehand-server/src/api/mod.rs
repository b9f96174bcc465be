//! HTTP API handlers
//!
//! One module per resource. Each exposes a `*_routes()` builder merged by
//! [`crate::build_router`]; every route except health, login and refresh sits
//! behind [`auth_middleware`].

pub mod analytics;
pub mod attachments;
pub mod auth;
pub mod departments;
pub mod documents;
pub mod health;
pub mod inventory;
pub mod performances;
pub mod schedule;
pub mod theater;
pub mod users;
pub mod venues;

pub use analytics::analytics_routes;
pub use attachments::attachment_routes;
pub use auth::{auth_middleware, auth_routes, session_routes, CurrentUser};
pub use departments::department_routes;
pub use documents::document_routes;
pub use health::health_routes;
pub use inventory::inventory_routes;
pub use performances::performance_routes;
pub use schedule::schedule_routes;
pub use theater::theater_routes;
pub use users::user_routes;
pub use venues::venue_routes;
