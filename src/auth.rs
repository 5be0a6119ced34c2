//! Identity provider: registration and credential verification.
//!
//! Passwords are stored as `"<salt>$<hex sha256(salt || password)>"` — salted,
//! one-way, never compared in plaintext. Failure messages are user-safe and do
//! not distinguish a missing user from a wrong password.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => digest(salt, password) == hash,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Register a new user. Enforces minimum lengths and username uniqueness.
pub async fn register(pool: &SqlitePool, username: &str, password: &str) -> Result<i64> {
    if username.is_empty() || password.is_empty() {
        bail!("Username and password are required");
    }
    if username.chars().count() < MIN_USERNAME_LEN {
        bail!("Username must be at least {} characters", MIN_USERNAME_LEN);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
    }

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        bail!("Username already exists");
    }

    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hash_password(password))
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Verify credentials, returning the stable user id on success.
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<i64> {
    if username.is_empty() || password.is_empty() {
        bail!("Username and password are required");
    }

    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((id, hash)) if verify_password(password, &hash) => Ok(id),
        _ => bail!("Invalid username or password"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::connect_at(&tmp.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::create_schema(&pool).await.unwrap();
        (tmp, pool)
    }

    #[test]
    fn hash_roundtrip() {
        let hashed = hash_password("hunter42");
        assert!(verify_password("hunter42", &hashed));
        assert!(!verify_password("hunter43", &hashed));
    }

    #[test]
    fn hashes_are_salted() {
        // Same password, different salt, different stored value
        assert_ne!(hash_password("hunter42"), hash_password("hunter42"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "no-dollar-separator"));
    }

    #[tokio::test]
    async fn register_enforces_lengths() {
        let (_tmp, pool) = test_pool().await;
        assert!(register(&pool, "ab", "longenough").await.is_err());
        assert!(register(&pool, "alice", "short").await.is_err());
        assert!(register(&pool, "alice", "longenough").await.is_ok());
    }

    #[tokio::test]
    async fn register_rejects_duplicate_username() {
        let (_tmp, pool) = test_pool().await;
        register(&pool, "alice", "password1").await.unwrap();
        let err = register(&pool, "alice", "password2").await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn authenticate_returns_stable_id() {
        let (_tmp, pool) = test_pool().await;
        let id = register(&pool, "alice", "password1").await.unwrap();
        assert_eq!(authenticate(&pool, "alice", "password1").await.unwrap(), id);
        assert!(authenticate(&pool, "alice", "wrong").await.is_err());
        assert!(authenticate(&pool, "nobody", "password1").await.is_err());
    }
}
