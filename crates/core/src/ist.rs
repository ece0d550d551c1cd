//! Intent–Skill–Trajectory (IST) domain types.
//!
//! These are the request-scoped value objects that flow through the
//! service: a caller sends an [`IstRequest`] with optional context, the
//! extractor answers with an [`ExtractionResult`]. Nothing here is
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Student,
    Tutor,
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::Student => "student",
            ChatRole::Tutor => "tutor",
            ChatRole::System => "system",
        }
    }
}

/// A single message from the tutoring conversation, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A previously computed extraction, supplied as read-only context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IstHistoryItem {
    pub intent: String,
    pub skills: Vec<String>,
    pub trajectory: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Snapshot of the student's skill assessment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentProfile {
    #[serde(default)]
    pub strong_skills: Vec<String>,
    #[serde(default)]
    pub weak_skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_progress: Option<String>,
}

/// Body of `POST /api/intent-skill-trajectory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IstRequest {
    /// The student's message / question in natural language.
    pub utterance: String,

    /// Course name, topic, week or syllabus snippet.
    #[serde(default)]
    pub course_context: Option<String>,

    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,

    #[serde(default)]
    pub ist_history: Vec<IstHistoryItem>,

    #[serde(default)]
    pub student_profile: Option<StudentProfile>,
}

impl IstRequest {
    /// A request carrying only an utterance.
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            course_context: None,
            chat_history: Vec::new(),
            ist_history: Vec::new(),
            student_profile: None,
        }
    }

    /// Set the course context.
    pub fn with_course_context(mut self, context: impl Into<String>) -> Self {
        self.course_context = Some(context.into());
        self
    }

    /// Schema checks that serde cannot express. Runs before any model call.
    pub fn validate(&self) -> Result<()> {
        if self.utterance.is_empty() {
            return Err(Error::Validation(
                "utterance: String should have at least 1 character".into(),
            ));
        }
        Ok(())
    }

    /// Course context with `None` collapsed to the empty string.
    pub fn course_context_or_empty(&self) -> &str {
        self.course_context.as_deref().unwrap_or("")
    }
}

/// The normalized extraction returned to the caller.
///
/// Invariant (upheld by the normalizer): `intent` is trimmed and
/// non-empty; `skills` and `trajectory` are non-empty and every entry is
/// trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub intent: String,
    pub skills: Vec<String>,
    pub trajectory: Vec<String>,
}
