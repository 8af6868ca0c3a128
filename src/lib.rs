//! # docqa
//!
//! Document question answering over a local folder of files.
//!
//! docqa extracts text from TXT, PDF and DOCX files, splits it into
//! overlapping chunks, embeds them with an OpenAI-compatible API and keeps
//! the vectors in SQLite. Questions are answered by retrieving the closest
//! chunks and handing them, with the asker's recent conversation, to a
//! chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Documents │──▶│  Processor   │──▶│ SQLite store │
//! │ txt/pdf/  │   │ extract+chunk│   │ f32 BLOBs    │
//! │ docx      │   │ + embeddings │   └──────┬───────┘
//! └───────────┘   └──────────────┘          │
//!                                           ▼
//!   ┌──────────┐   ┌────────────┐   ┌──────────────┐
//!   │ HTTP/CLI │──▶│ RagService │◀─▶│ Conversation │
//!   └──────────┘   │ prompt+LLM │   │ memory (JSON)│
//!                  └────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! docqa init
//! docqa index --dir ./data/documents
//! docqa ask --user alice "What does the onboarding guide say about VPN access?"
//! docqa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Service error type and HTTP mapping |
//! | [`extract`] | TXT / PDF / DOCX text extraction |
//! | [`processor`] | Directory walk, extraction, chunking |
//! | [`embedding`] | Embedding client trait + OpenAI implementation |
//! | [`llm`] | Language model trait + OpenAI chat implementation |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`memory`] | Per-user conversation memory |
//! | [`rag`] | Indexing and query pipelines |
//! | [`server`] | HTTP API |

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod memory;
pub mod migrate;
pub mod openai;
pub mod processor;
pub mod rag;
pub mod server;
pub mod sqlite_store;
pub mod stats;
