//! Document ingestion pipeline.
//!
//! Coordinates one upload end to end: extract pages → chunk with overlap →
//! embed every chunk → replace the file's chunks in a single transaction.
//! The embedding provider here is the same one retrieval uses; that is what
//! keeps stored vectors and query vectors comparable.
//!
//! Re-ingesting a filename replaces all of its prior chunks. A failure at any
//! stage commits nothing, so the store never holds some-but-not-all chunks of
//! one upload.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::chunk::{chunk_pages, PageChunk};
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::extract::{self, ExtractError};

/// Ingestion failure taxonomy. `EmptyDocument` and `Extract` are rejected
/// inputs; `Embedding` and `Store` are backend failures (nothing committed).
#[derive(Debug)]
pub enum IngestError {
    EmptyDocument,
    Extract(ExtractError),
    Embedding(String),
    Store(String),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::EmptyDocument => {
                write!(f, "document contains no extractable text")
            }
            IngestError::Extract(e) => write!(f, "{}", e),
            IngestError::Embedding(e) => write!(f, "embedding failed: {}", e),
            IngestError::Store(e) => write!(f, "storing chunks failed: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<ExtractError> for IngestError {
    fn from(e: ExtractError) -> Self {
        IngestError::Extract(e)
    }
}

/// Deterministic chunk id: re-ingesting the same filename maps onto the same
/// id space, so replace is well defined.
pub fn chunk_id(user_id: i64, filename: &str, index: usize) -> String {
    format!("user_{}_file_{}_chunk_{}", user_id, filename, index)
}

/// Ingest one document for `user_id`. Returns the number of chunks stored.
pub async fn ingest_document(
    config: &Config,
    pool: &SqlitePool,
    user_id: i64,
    bytes: &[u8],
    filename: &str,
) -> Result<usize, IngestError> {
    let pages = extract::extract_pages(bytes, filename)?;
    if extract::is_empty_document(&pages) {
        return Err(IngestError::EmptyDocument);
    }

    let chunks = chunk_pages(
        &pages,
        config.chunking.chunk_chars,
        config.chunking.overlap_chars,
    );
    if chunks.is_empty() {
        return Err(IngestError::EmptyDocument);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedding::embed_texts(&config.embedding, &texts)
        .await
        .map_err(|e| IngestError::Embedding(e.to_string()))?;

    replace_file_chunks(pool, user_id, filename, &chunks, &vectors)
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;

    Ok(chunks.len())
}

/// Atomically swap out all chunks for `(user_id, filename)`: delete the prior
/// batch and insert the new one inside one transaction.
pub(crate) async fn replace_file_chunks(
    pool: &SqlitePool,
    user_id: i64,
    filename: &str,
    chunks: &[PageChunk],
    vectors: &[Vec<f32>],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let total = chunks.len() as i64;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM doc_chunks WHERE user_id = ? AND filename = ?")
        .bind(user_id)
        .bind(filename)
        .execute(&mut *tx)
        .await?;

    for (index, (chunk, vector)) in chunks.iter().zip(vectors.iter()).enumerate() {
        sqlx::query(
            "INSERT INTO doc_chunks \
             (id, user_id, filename, chunk_index, total_chunks, page_number, text, embedding, uploaded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(chunk_id(user_id, filename, index))
        .bind(user_id)
        .bind(filename)
        .bind(index as i64)
        .bind(total)
        .bind(chunk.page_number)
        .bind(&chunk.text)
        .bind(embedding::vec_to_blob(vector))
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Distinct filenames this user has uploaded, sorted.
pub async fn list_files(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT DISTINCT filename FROM doc_chunks WHERE user_id = ? ORDER BY filename",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("filename")).collect())
}

/// Delete every chunk of one file for one user. Returns the rows removed.
pub async fn delete_file(pool: &SqlitePool, user_id: i64, filename: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM doc_chunks WHERE user_id = ? AND filename = ?")
        .bind(user_id)
        .bind(filename)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!("file not found: {}", filename);
    }

    Ok(result.rows_affected())
}

/// CLI entry point for `mbot ingest`.
pub async fn run_ingest(config: &Config, user_id: i64, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid filename: {}", path.display()))?;

    let pool = db::pool(config).await?;

    let count = ingest_document(config, pool, user_id, &bytes, filename)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("ingest {}", filename);
    println!("  chunks stored: {}", count);
    Ok(())
}

/// CLI entry point for `mbot files`.
pub async fn run_files(config: &Config, user_id: i64) -> Result<()> {
    let pool = db::pool(config).await?;
    let files = list_files(pool, user_id).await?;

    if files.is_empty() {
        println!("No documents uploaded.");
        return Ok(());
    }

    for file in files {
        println!("{}", file);
    }
    Ok(())
}

/// CLI entry point for `mbot forget`.
pub async fn run_forget(config: &Config, user_id: i64, filename: &str) -> Result<()> {
    let pool = db::pool(config).await?;
    let removed = delete_file(pool, user_id, filename).await?;
    println!("forgot {} ({} chunks)", filename, removed);
    Ok(())
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

    // Chunk rows reference users(id), so tests create their users first.
    async fn seed_user(pool: &SqlitePool, id: i64) {
        sqlx::query("INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, 0)")
            .bind(id)
            .bind(format!("user{}", id))
            .bind("salt$hash")
            .execute(pool)
            .await
            .unwrap();
    }

    fn fake_chunks(n: usize) -> (Vec<PageChunk>, Vec<Vec<f32>>) {
        let chunks = (0..n)
            .map(|i| PageChunk {
                page_number: i as i64 + 1,
                text: format!("chunk number {}", i),
            })
            .collect();
        let vectors = (0..n).map(|i| vec![i as f32, 1.0, 0.0]).collect();
        (chunks, vectors)
    }

    async fn count_chunks(pool: &SqlitePool, user_id: i64, filename: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM doc_chunks WHERE user_id = ? AND filename = ?")
            .bind(user_id)
            .bind(filename)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn chunk_ids_are_deterministic_per_triple() {
        assert_eq!(chunk_id(1, "a.pdf", 0), chunk_id(1, "a.pdf", 0));
        assert_ne!(chunk_id(1, "a.pdf", 0), chunk_id(1, "a.pdf", 1));
        assert_ne!(chunk_id(1, "a.pdf", 0), chunk_id(2, "a.pdf", 0));
        assert_ne!(chunk_id(1, "a.pdf", 0), chunk_id(1, "b.pdf", 0));
    }

    #[tokio::test]
    async fn empty_document_rejected_before_any_write() {
        let (_tmp, pool) = test_pool().await;
        let config = crate::config::Config {
            db: crate::config::DbConfig {
                path: "unused".into(),
            },
            chunking: Default::default(),
            retrieval: Default::default(),
            embedding: Default::default(),
            model: Default::default(),
            chat: Default::default(),
        };

        let err = ingest_document(&config, &pool, 1, b"   \n  ", "blank.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::EmptyDocument));
        assert_eq!(count_chunks(&pool, 1, "blank.txt").await, 0);
    }

    #[tokio::test]
    async fn embedding_failure_commits_nothing() {
        let (_tmp, pool) = test_pool().await;
        // Default config: provider disabled, so embedding always fails
        let config = crate::config::Config {
            db: crate::config::DbConfig {
                path: "unused".into(),
            },
            chunking: Default::default(),
            retrieval: Default::default(),
            embedding: Default::default(),
            model: Default::default(),
            chat: Default::default(),
        };

        let err = ingest_document(&config, &pool, 1, b"some real text", "notes.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Embedding(_)));
        assert_eq!(count_chunks(&pool, 1, "notes.txt").await, 0);
    }

    #[tokio::test]
    async fn reingest_replaces_instead_of_duplicating() {
        let (_tmp, pool) = test_pool().await;
        seed_user(&pool, 1).await;

        let (chunks, vectors) = fake_chunks(7);
        replace_file_chunks(&pool, 1, "doc.pdf", &chunks, &vectors)
            .await
            .unwrap();
        assert_eq!(count_chunks(&pool, 1, "doc.pdf").await, 7);

        let (chunks, vectors) = fake_chunks(4);
        replace_file_chunks(&pool, 1, "doc.pdf", &chunks, &vectors)
            .await
            .unwrap();
        assert_eq!(count_chunks(&pool, 1, "doc.pdf").await, 4);
    }

    #[tokio::test]
    async fn delete_file_is_scoped_by_user_and_filename() {
        let (_tmp, pool) = test_pool().await;
        seed_user(&pool, 1).await;
        seed_user(&pool, 2).await;

        let (chunks, vectors) = fake_chunks(3);
        replace_file_chunks(&pool, 1, "a.pdf", &chunks, &vectors)
            .await
            .unwrap();
        replace_file_chunks(&pool, 1, "b.pdf", &chunks, &vectors)
            .await
            .unwrap();
        replace_file_chunks(&pool, 2, "a.pdf", &chunks, &vectors)
            .await
            .unwrap();

        let removed = delete_file(&pool, 1, "a.pdf").await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(count_chunks(&pool, 1, "a.pdf").await, 0);
        // Other files and other users untouched
        assert_eq!(count_chunks(&pool, 1, "b.pdf").await, 3);
        assert_eq!(count_chunks(&pool, 2, "a.pdf").await, 3);
    }

    #[tokio::test]
    async fn delete_unknown_file_reports_not_found() {
        let (_tmp, pool) = test_pool().await;
        let err = delete_file(&pool, 1, "ghost.pdf").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn list_files_is_sorted_and_distinct() {
        let (_tmp, pool) = test_pool().await;
        seed_user(&pool, 1).await;
        let (chunks, vectors) = fake_chunks(2);
        replace_file_chunks(&pool, 1, "zeta.pdf", &chunks, &vectors)
            .await
            .unwrap();
        replace_file_chunks(&pool, 1, "alpha.txt", &chunks, &vectors)
            .await
            .unwrap();

        let files = list_files(&pool, 1).await.unwrap();
        assert_eq!(files, vec!["alpha.txt".to_string(), "zeta.pdf".to_string()]);
        assert!(list_files(&pool, 2).await.unwrap().is_empty());
    }
}
