use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tokio::task;
use tracing::error;

use crate::error::AppError;

fn internal(context: &'static str) -> impl FnOnce(password_hash::Error) -> AppError {
    move |e| {
        error!(error = %e, "{context}");
        AppError::Internal(format!("{context}: {e}"))
    }
}

/// Salted argon2id digest in PHC string form. The caller drops the plaintext.
pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(internal("password hashing failed"))
}

/// `Ok(false)` on mismatch; `Err` only when the stored digest is unreadable.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored).map_err(internal("stored password hash is malformed"))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(internal("password verification failed")(e)),
    }
}

/// [`hash_password`] on the blocking pool; argon2 is deliberately slow.
pub async fn hash_password_blocking(plain: String) -> Result<String, AppError> {
    task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(plain: String, stored: String) -> Result<bool, AppError> {
    task::spawn_blocking(move || verify_password(&plain, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {e}")))?
}
