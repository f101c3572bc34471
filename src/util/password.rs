//! Password hashing for user records

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::CoreError;

/// Hash a plaintext password with Argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CoreError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::Internal(format!("failed to hash password: {e}")))?;

    Ok(password_hash.to_string())
}

/// Check a plaintext password against a stored Argon2 hash.
pub fn verify_password(password: &str, hashed: &str) -> Result<bool, CoreError> {
    let parsed_hash = PasswordHash::new(hashed)
        .map_err(|e| CoreError::Internal(format!("invalid password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
