//! Message types exchanged with a model provider.
//!
//! These are the prompt-level value objects: the extractor builds a
//! system + user message pair, the provider answers with an assistant
//! message.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a provider conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller's input
    User,
    /// The model's reply
    Assistant,
    /// System instructions
    System,
}

/// A single message sent to or received from a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }
}
