//! Transcript export.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::store;

/// CLI entry point for `mbot export`. Exports the named session (or the
/// active one) as plain text, one `role: content` line per message, to a
/// file or stdout.
pub async fn run_export(
    config: &Config,
    user_id: i64,
    session_id: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let pool = db::pool(config).await?;
    let collection = store::load_sessions(pool, user_id).await?;

    let session = match session_id {
        Some(id) => collection
            .get(id)
            .with_context(|| format!("session not found: {}", id))?,
        None => match collection.active() {
            Some(s) => s,
            None => bail!("No sessions to export"),
        },
    };

    let transcript = session.transcript();

    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", transcript))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "exported {} ({} messages) to {}",
                session.title,
                session.messages.len(),
                path.display()
            );
        }
        None => {
            println!("{}", transcript);
        }
    }

    Ok(())
}
