//! In-memory chat session model.
//!
//! A [`SessionCollection`] is the full set of one user's sessions plus the
//! active-session pointer. It is the atomic unit of persistence: the store
//! saves and loads it as a whole. Invariants enforced here:
//!
//! - messages are append-only; insertion order is conversational order
//! - an authenticated user always has at least one session after bootstrap,
//!   and deleting the last remaining session is rejected
//! - deleting the active session promotes the first remaining session
//!   (sorted by id) in the same operation
//! - the title is rewritten exactly once, from the first user message, when
//!   the first exchange completes

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const TITLE_PLACEHOLDER: &str = "New Chat";
pub const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub messages: Vec<Message>,
}

impl ChatSession {
    pub fn new(now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: TITLE_PLACEHOLDER.to_string(),
            created_at: now,
            messages: Vec::new(),
        }
    }

    /// Sets the title from the first user message, once: only when the first
    /// user+assistant exchange has just completed. Keyed on the assistant
    /// message count rather than the title text, so a first message that
    /// happens to equal the placeholder still pins the title permanently.
    pub fn apply_title_from_first_exchange(&mut self) {
        let assistants = self
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        if assistants != 1 {
            return;
        }
        if let Some(first) = self.messages.iter().find(|m| m.role == Role::User) {
            self.title = truncate_title(&first.content);
        }
    }

    /// Transcript in display order, one `"<role>: <content>"` line per message.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Truncate at [`TITLE_MAX_CHARS`] characters, appending an ellipsis marker
/// iff the original exceeded the bound.
pub fn truncate_title(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= TITLE_MAX_CHARS {
        text.to_string()
    } else {
        let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
        title.push_str("...");
        title
    }
}

/// All of one user's sessions plus the active pointer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionCollection {
    sessions: BTreeMap<String, ChatSession>,
    active_id: Option<String>,
}

impl SessionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from loaded parts. An active id that no longer maps to a
    /// session falls back to the first session in sorted-id order.
    pub fn from_parts(sessions: BTreeMap<String, ChatSession>, active_id: Option<String>) -> Self {
        let active_id = match active_id {
            Some(id) if sessions.contains_key(&id) => Some(id),
            _ => sessions.keys().next().cloned(),
        };
        Self { sessions, active_id }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Sessions in sorted-id order.
    pub fn iter(&self) -> impl Iterator<Item = &ChatSession> {
        self.sessions.values()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.get(id)
    }

    /// Ensure at least one session exists; returns the active session id.
    pub fn bootstrap(&mut self, now: i64) -> String {
        if self.sessions.is_empty() {
            self.create(now)
        } else {
            match self.active_id.clone() {
                Some(id) => id,
                None => {
                    let id = self
                        .sessions
                        .keys()
                        .next()
                        .cloned()
                        .unwrap_or_default();
                    self.active_id = Some(id.clone());
                    id
                }
            }
        }
    }

    /// Create a new session and make it active.
    pub fn create(&mut self, now: i64) -> String {
        let session = ChatSession::new(now);
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        self.active_id = Some(id.clone());
        id
    }

    pub fn switch(&mut self, id: &str) -> Result<()> {
        if !self.sessions.contains_key(id) {
            bail!("session not found: {}", id);
        }
        self.active_id = Some(id.to_string());
        Ok(())
    }

    /// Delete a session. The last remaining session cannot be deleted;
    /// deleting the active session promotes a replacement in the same call.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if !self.sessions.contains_key(id) {
            bail!("session not found: {}", id);
        }
        if self.sessions.len() == 1 {
            bail!("cannot delete the only remaining session");
        }
        self.sessions.remove(id);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.sessions.keys().next().cloned();
        }
        Ok(())
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.active_id.as_deref().and_then(|id| self.sessions.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut ChatSession> {
        let id = self.active_id.clone()?;
        self.sessions.get_mut(&id)
    }
}
