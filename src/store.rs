//! Chat session store.
//!
//! Persists a user's [`SessionCollection`] as one row per session, messages
//! serialized to JSON. `save` is a full replace inside a transaction: every
//! previously persisted session for that user is removed before the current
//! set is written, so sessions deleted in memory do not resurrect on the next
//! load. A failed save leaves the database untouched and the caller's
//! in-memory collection intact.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use crate::session::{ChatSession, Message, SessionCollection};

/// Load every session for `user_id`. Returns an empty collection when the
/// user has never saved; the caller is responsible for bootstrapping.
pub async fn load_sessions(pool: &SqlitePool, user_id: i64) -> Result<SessionCollection> {
    let rows = sqlx::query(
        "SELECT session_id, title, created_at, is_active, messages_json \
         FROM sessions WHERE user_id = ? ORDER BY session_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut sessions = BTreeMap::new();
    let mut active_id: Option<String> = None;

    for row in &rows {
        let session_id: String = row.get("session_id");
        let messages_json: String = row.get("messages_json");
        let messages: Vec<Message> = serde_json::from_str(&messages_json)?;
        let is_active: bool = row.get("is_active");

        if is_active {
            active_id = Some(session_id.clone());
        }

        sessions.insert(
            session_id.clone(),
            ChatSession {
                id: session_id,
                title: row.get("title"),
                created_at: row.get("created_at"),
                messages,
            },
        );
    }

    Ok(SessionCollection::from_parts(sessions, active_id))
}

/// Replace all persisted sessions for `user_id` with the current collection.
pub async fn save_sessions(
    pool: &SqlitePool,
    user_id: i64,
    collection: &SessionCollection,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    for session in collection.iter() {
        let messages_json = serde_json::to_string(&session.messages)?;
        let is_active = collection.active_id() == Some(session.id.as_str());

        sqlx::query(
            "INSERT INTO sessions (user_id, session_id, title, created_at, is_active, messages_json) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&session.id)
        .bind(&session.title)
        .bind(session.created_at)
        .bind(is_active)
        .bind(&messages_json)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::session::Message;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::connect_at(&tmp.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::create_schema(&pool).await.unwrap();
        (tmp, pool)
    }

    // Session rows reference users(id), so tests create their users first.
    async fn seed_user(pool: &SqlitePool, id: i64) {
        sqlx::query("INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, 0)")
            .bind(id)
            .bind(format!("user{}", id))
            .bind("salt$hash")
            .execute(pool)
            .await
            .unwrap();
    }

    fn sample_collection() -> SessionCollection {
        let mut c = SessionCollection::new();
        let first = c.create(1700000100);
        c.active_mut().unwrap().messages.push(Message::user("hello"));
        c.active_mut()
            .unwrap()
            .messages
            .push(Message::assistant("hi there"));
        c.active_mut().unwrap().apply_title_from_first_exchange();
        c.create(1700000200);
        c.switch(&first).unwrap();
        c
    }

    #[tokio::test]
    async fn load_without_saves_is_empty_not_error() {
        let (_tmp, pool) = test_pool().await;
        let c = load_sessions(&pool, 1).await.unwrap();
        assert!(c.is_empty());
        assert_eq!(c.active_id(), None);
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let (_tmp, pool) = test_pool().await;
        seed_user(&pool, 1).await;
        let original = sample_collection();
        save_sessions(&pool, 1, &original).await.unwrap();

        let loaded = load_sessions(&pool, 1).await.unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.active_id(), original.active_id());
    }

    #[tokio::test]
    async fn resave_is_idempotent() {
        let (_tmp, pool) = test_pool().await;
        seed_user(&pool, 1).await;
        let c = sample_collection();
        save_sessions(&pool, 1, &c).await.unwrap();
        save_sessions(&pool, 1, &c).await.unwrap();

        let loaded = load_sessions(&pool, 1).await.unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.len(), c.len());
    }

    #[tokio::test]
    async fn deleted_sessions_do_not_resurrect() {
        let (_tmp, pool) = test_pool().await;
        seed_user(&pool, 1).await;
        let mut c = sample_collection();
        save_sessions(&pool, 1, &c).await.unwrap();

        let doomed = c
            .iter()
            .map(|s| s.id.clone())
            .find(|id| Some(id.as_str()) != c.active_id())
            .unwrap();
        c.delete(&doomed).unwrap();
        save_sessions(&pool, 1, &c).await.unwrap();

        let loaded = load_sessions(&pool, 1).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get(&doomed).is_none());
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let (_tmp, pool) = test_pool().await;
        seed_user(&pool, 1).await;
        seed_user(&pool, 2).await;
        let alice = sample_collection();
        let mut bob = SessionCollection::new();
        bob.create(1700000300);

        save_sessions(&pool, 1, &alice).await.unwrap();
        save_sessions(&pool, 2, &bob).await.unwrap();

        let loaded_alice = load_sessions(&pool, 1).await.unwrap();
        let loaded_bob = load_sessions(&pool, 2).await.unwrap();
        assert_eq!(loaded_alice, alice);
        assert_eq!(loaded_bob.len(), 1);
        // Saving one user never disturbs the other
        save_sessions(&pool, 2, &loaded_bob).await.unwrap();
        assert_eq!(load_sessions(&pool, 1).await.unwrap(), alice);
    }

    #[tokio::test]
    async fn active_flag_survives_round_trip() {
        let (_tmp, pool) = test_pool().await;
        seed_user(&pool, 7).await;
        let mut c = SessionCollection::new();
        c.create(1);
        let second = c.create(2);
        c.switch(&second).unwrap();

        save_sessions(&pool, 7, &c).await.unwrap();
        let loaded = load_sessions(&pool, 7).await.unwrap();
        assert_eq!(loaded.active_id(), Some(second.as_str()));
    }
}
