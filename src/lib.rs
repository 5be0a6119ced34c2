//! # Memobot
//!
//! A conversational assistant with per-user memory.
//!
//! Memobot ingests a user's documents (PDF, plain text, Markdown), chunks and
//! embeds them into a local SQLite store, and answers questions by retrieving
//! the most relevant chunks and streaming a grounded reply from a hosted chat
//! model. Every user's documents and chat sessions are isolated; conversations
//! persist across runs.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │ Documents │──▶│   Pipeline    │──▶│  SQLite   │
//! │ PDF/TXT/MD│   │ Chunk+Embed  │   │ chunks+   │
//! └──────────┘   └──────────────┘   │ sessions  │
//!                                   └────┬─────┘
//!                                        │ retrieve
//!                ┌──────────┐       ┌────▼─────┐
//!                │ Chat LLM │◀──────│   Turn    │
//!                │ (stream) │──────▶│ (orchestr)│
//!                └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mbot init                                  # create database
//! mbot register alice secret123             # create a user
//! mbot --user alice --password secret123 ingest report.pdf
//! mbot --user alice --password secret123 ask "what does the report conclude?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`auth`] | User registration and credential verification |
//! | [`extract`] | Page text extraction from PDF/TXT/MD |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction and vector utilities |
//! | [`ingest`] | Document ingestion pipeline |
//! | [`retrieve`] | Per-user similarity retrieval |
//! | [`session`] | In-memory chat session model |
//! | [`store`] | Chat session persistence |
//! | [`llm`] | Streaming chat completion client |
//! | [`turn`] | Conversation orchestration |
//! | [`export`] | Transcript export |

pub mod auth;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod retrieve;
pub mod session;
pub mod store;
pub mod turn;
