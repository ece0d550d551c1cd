//! # CourseLLM Core
//!
//! Domain types, traits, and error definitions for the CourseLLM
//! intent–skill–trajectory (IST) service. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! The model backend is defined as a trait here; implementations live in
//! `coursellm-providers`. Request-scoped tutoring types (chat history,
//! prior IST events, student profile, extraction result) live in [`ist`]
//! so the HTTP gateway, the extractor, and the CLI all share one wire
//! format.

pub mod error;
pub mod ist;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result};
pub use ist::{ChatMessage, ChatRole, ExtractionResult, IstHistoryItem, IstRequest, StudentProfile};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
