//! LLM Provider implementations for the CourseLLM IST service.
//!
//! All providers implement the `coursellm_core::Provider` trait.
//! The router builds the configured provider from resolved settings.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
