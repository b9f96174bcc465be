//! Authentication primitives
//!
//! Pure functions and types with no HTTP framework dependencies. The server
//! crate wraps these with axum middleware.
//!
//! - [`password`]: Argon2id password hashes
//! - [`jwt`]: HS256 access and refresh tokens
//! - [`roles`]: role → permission mapping

pub mod jwt;
pub mod password;
pub mod roles;

pub use jwt::{Claims, JwtKeys, TokenKind};
pub use password::{
    hash_password, spawn_hash_password, spawn_verify_password, validate_password_policy,
    verify_password,
};
pub use roles::{Permission, Role};
