//! # docqa core
//!
//! Runtime-agnostic logic for docqa: data models, fixed-size chunking,
//! vector store abstraction, the bounded conversation window, and prompt
//! assembly for the retrieval-augmented query path.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Everything
//! that talks to the outside world lives in the `docqa` app crate.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod prompt;
pub mod store;
pub mod window;
