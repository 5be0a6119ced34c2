//! Conversation orchestrator.
//!
//! One turn: load the user's sessions, append the prompt, retrieve document
//! context (fail-soft), stream the model's reply to stdout, then persist the
//! whole collection. The persisted history is unbounded; only the slice sent
//! to the model is capped at the configured history limit.

use anyhow::{Context, Result};
use std::io::Write;

use crate::config::Config;
use crate::db;
use crate::retrieve::{self, ContextSnippet};
use crate::session::Message;
use crate::store;

/// Marker the model is told to prefix document-grounded answers with, so the
/// user can tell recalled knowledge from general knowledge.
pub const ATTRIBUTION_MARKER: &str = "[From your documents]";

/// Assemble the message list sent to the model: one system message followed
/// by the most recent `history_limit` conversation messages.
pub fn build_model_messages(
    instructions: Option<&str>,
    snippets: &[ContextSnippet],
    history: &[Message],
    history_limit: usize,
) -> Vec<Message> {
    let mut system = String::new();
    if let Some(instructions) = instructions {
        system.push_str(instructions.trim());
        system.push_str("\n\n");
    }

    if snippets.is_empty() {
        system.push_str("You have no stored documents relevant to this question. Answer from general knowledge.");
    } else {
        system.push_str(
            "The user has uploaded documents. Relevant excerpts are below. \
             When your answer draws on them, start the answer with the marker ",
        );
        system.push_str(ATTRIBUTION_MARKER);
        system.push_str(" and cite the source document.\n\n");
        system.push_str(&retrieve::format_context(snippets));
    }

    let start = history.len().saturating_sub(history_limit);
    let mut messages = Vec::with_capacity(1 + history.len() - start);
    messages.push(Message::system(system));
    messages.extend_from_slice(&history[start..]);
    messages
}

/// CLI entry point for `mbot ask`.
pub async fn run_ask(
    config: &Config,
    user_id: i64,
    prompt: &str,
    session_id: Option<&str>,
) -> Result<()> {
    let pool = db::pool(config).await?;
    let mut collection = store::load_sessions(pool, user_id).await?;
    let now = chrono::Utc::now().timestamp();
    collection.bootstrap(now);

    if let Some(id) = session_id {
        collection.switch(id)?;
    }

    let snippets = retrieve::retrieve_context_soft(config, pool, user_id, prompt).await;

    {
        let session = collection
            .active_mut()
            .context("No active session after bootstrap")?;
        session.messages.push(Message::user(prompt));
    }

    let session = collection.active().context("No active session")?;
    let model_messages = build_model_messages(
        config.chat.instructions.as_deref(),
        &snippets,
        &session.messages,
        config.chat.history_limit,
    );

    let result = crate::llm::stream_chat(&config.model, &model_messages, |delta| {
        print!("{}", delta);
        let _ = std::io::stdout().flush();
    })
    .await;

    match result {
        Ok(reply) => {
            println!();
            let session = collection
                .active_mut()
                .context("No active session")?;
            session.messages.push(Message::assistant(reply));
            session.apply_title_from_first_exchange();
            if let Err(e) = store::save_sessions(pool, user_id, &collection).await {
                eprintln!("Warning: failed to save session: {}", e);
            }
            Ok(())
        }
        Err(e) => {
            // Keep the user's prompt on record even though the reply failed.
            if let Err(save_err) = store::save_sessions(pool, user_id, &collection).await {
                eprintln!("Warning: failed to save session: {}", save_err);
            }
            Err(e)
        }
    }
}

/// CLI entry point for `mbot session list`.
pub async fn run_session_list(config: &Config, user_id: i64) -> Result<()> {
    let pool = db::pool(config).await?;
    let mut collection = store::load_sessions(pool, user_id).await?;

    if collection.is_empty() {
        collection.bootstrap(chrono::Utc::now().timestamp());
        store::save_sessions(pool, user_id, &collection).await?;
    }

    for session in collection.iter() {
        let marker = if collection.active_id() == Some(session.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  {}  ({} messages)",
            marker,
            session.id,
            session.title,
            session.messages.len()
        );
    }
    Ok(())
}

/// CLI entry point for `mbot session new`.
pub async fn run_session_new(config: &Config, user_id: i64) -> Result<()> {
    let pool = db::pool(config).await?;
    let mut collection = store::load_sessions(pool, user_id).await?;
    let id = collection.create(chrono::Utc::now().timestamp());
    store::save_sessions(pool, user_id, &collection).await?;
    println!("created session {}", id);
    Ok(())
}

/// CLI entry point for `mbot session switch`.
pub async fn run_session_switch(config: &Config, user_id: i64, id: &str) -> Result<()> {
    let pool = db::pool(config).await?;
    let mut collection = store::load_sessions(pool, user_id).await?;
    collection.switch(id)?;
    store::save_sessions(pool, user_id, &collection).await?;
    println!("switched to session {}", id);
    Ok(())
}

/// CLI entry point for `mbot session delete`.
pub async fn run_session_delete(config: &Config, user_id: i64, id: &str) -> Result<()> {
    let pool = db::pool(config).await?;
    let mut collection = store::load_sessions(pool, user_id).await?;
    collection.delete(id)?;
    store::save_sessions(pool, user_id, &collection).await?;
    println!("deleted session {}", id);
    if let Some(active) = collection.active_id() {
        println!("active session is now {}", active);
    }
    Ok(())
}
