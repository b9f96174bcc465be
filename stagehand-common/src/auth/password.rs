//! Password hashing
//!
//! Passwords are stored as Argon2id PHC strings (`$argon2id$v=19$...`), so
//! the salt and parameters travel with the hash. Hashing is CPU-bound; async
//! callers use [`spawn_hash_password`] and [`spawn_verify_password`].

use crate::{Error, Result};
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string
///
/// An empty or malformed stored hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// [`hash_password`] on the blocking thread pool
pub async fn spawn_hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))?
}

/// [`verify_password`] on the blocking thread pool
pub async fn spawn_verify_password(password: String, stored: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .unwrap_or(false)
}

/// Enforce the password policy: length and at least one letter and one digit
pub fn validate_password_policy(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(Error::InvalidInput(
            "Password must contain at least one letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInput(
            "Password must contain at least one digit".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("curtain-call-7").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("curtain-call-7", &stored));
        assert!(!verify_password("curtain-call-8", &stored));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same-password-1").unwrap();
        let b = hash_password("same-password-1").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same-password-1", &a));
        assert!(verify_password("same-password-1", &b));
    }

    #[test]
    fn test_empty_or_malformed_hash_never_verifies() {
        assert!(!verify_password("", ""));
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "5e884898da28047151d0e56f8dc6292773603d0d"));
    }

    #[tokio::test]
    async fn test_spawned_hash_and_verify() {
        let stored = spawn_hash_password("wings-and-flies-9".to_string())
            .await
            .unwrap();
        assert!(spawn_verify_password("wings-and-flies-9".to_string(), stored.clone()).await);
        assert!(!spawn_verify_password("wings-and-flies-0".to_string(), stored).await);
    }

    #[test]
    fn test_policy() {
        assert!(validate_password_policy("abc12345").is_ok());
        assert!(validate_password_policy("short1").is_err());
        assert!(validate_password_policy("onlyletters").is_err());
        assert!(validate_password_policy("1234567890").is_err());
    }
}
