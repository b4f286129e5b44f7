use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

/// Longest secret accepted for hashing, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 1024;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("password longer than {MAX_PASSWORD_BYTES} bytes")]
    TooLong,
    #[error("argon2: {0}")]
    Argon2(String),
}

/// Hashes `plain` with Argon2id and a fresh OS-random salt into a PHC string.
pub fn hash_password(plain: &str) -> Result<String, HashError> {
    if plain.len() > MAX_PASSWORD_BYTES {
        return Err(HashError::TooLong);
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            HashError::Argon2(e.to_string())
        })?
        .to_string();
    Ok(hash)
}
