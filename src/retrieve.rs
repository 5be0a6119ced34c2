//! Per-user context retrieval.
//!
//! Embeds the query, scans the user's stored chunk vectors, converts cosine
//! distance to a similarity score via `1 / (1 + distance)`, drops results at
//! or below the configured threshold, and returns the top-k by similarity.
//! Retrieval only ever sees the querying user's chunks.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding;

/// One retrieved chunk with its provenance and score.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnippet {
    pub text: String,
    pub filename: String,
    pub page_number: i64,
    pub similarity: f64,
}

/// A stored chunk pulled into memory for scoring.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub filename: String,
    pub page_number: i64,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Score and rank candidate chunks against a query vector.
///
/// Pure so the threshold and ordering rules are testable without a database
/// or an embedding provider. Results strictly above `min_similarity`, sorted
/// by descending similarity, at most `top_k`.
pub fn rank_chunks(
    query: &[f32],
    chunks: &[StoredChunk],
    min_similarity: f64,
    top_k: usize,
) -> Vec<ContextSnippet> {
    let mut scored: Vec<ContextSnippet> = chunks
        .iter()
        .map(|chunk| {
            let distance = embedding::cosine_distance(query, &chunk.embedding);
            ContextSnippet {
                text: chunk.text.clone(),
                filename: chunk.filename.clone(),
                page_number: chunk.page_number,
                similarity: embedding::similarity_from_distance(distance),
            }
        })
        .filter(|s| s.similarity > min_similarity)
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}

/// Load every chunk belonging to `user_id`.
pub async fn load_user_chunks(pool: &SqlitePool, user_id: i64) -> Result<Vec<StoredChunk>> {
    let rows = sqlx::query(
        "SELECT filename, page_number, text, embedding \
         FROM doc_chunks WHERE user_id = ? ORDER BY filename, chunk_index",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            StoredChunk {
                filename: row.get("filename"),
                page_number: row.get("page_number"),
                text: row.get("text"),
                embedding: embedding::blob_to_vec(&blob),
            }
        })
        .collect())
}

/// Retrieve the most relevant context snippets for one user's query.
pub async fn retrieve_context(
    config: &Config,
    pool: &SqlitePool,
    user_id: i64,
    query: &str,
    top_k: usize,
) -> Result<Vec<ContextSnippet>> {
    let chunks = load_user_chunks(pool, user_id).await?;
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embedding::embed_query(&config.embedding, query).await?;
    Ok(rank_chunks(
        &query_vec,
        &chunks,
        config.retrieval.min_similarity,
        top_k,
    ))
}

/// Retrieval for the conversational path: a backend failure degrades to no
/// context instead of failing the whole turn.
pub async fn retrieve_context_soft(
    config: &Config,
    pool: &SqlitePool,
    user_id: i64,
    query: &str,
) -> Vec<ContextSnippet> {
    match retrieve_context(config, pool, user_id, query, config.retrieval.top_k).await {
        Ok(snippets) => snippets,
        Err(e) => {
            eprintln!("Warning: context retrieval failed: {}", e);
            Vec::new()
        }
    }
}

/// Render snippets as a context block for the model, one header line per
/// snippet naming the source document and page.
pub fn format_context(snippets: &[ContextSnippet]) -> String {
    let mut out = String::new();
    for snippet in snippets {
        out.push_str(&format!(
            "[Source: {} (page {})]\n{}\n\n",
            snippet.filename, snippet.page_number, snippet.text
        ));
    }
    out.trim_end().to_string()
}

/// CLI entry point for `mbot context` — shows what retrieval would hand the
/// model for a given query.
pub async fn run_context(config: &Config, user_id: i64, query: &str, top_k: usize) -> Result<()> {
    let pool = db::pool(config).await?;
    let snippets = retrieve_context(config, pool, user_id, query, top_k).await?;

    if snippets.is_empty() {
        println!("No relevant context found.");
        return Ok(());
    }

    for snippet in &snippets {
        println!(
            "{} (page {})  similarity {:.3}",
            snippet.filename, snippet.page_number, snippet.similarity
        );
        println!("  {}", snippet.text.replace('\n', "\n  "));
        println!();
    }
    Ok(())
}
