//! Context formatter: renders request context as compact prompt text.
//!
//! Every function here is pure and total. Empty inputs produce a fixed
//! sentinel line rather than an empty string, so the prompt always tells
//! the model explicitly that a section had no data.

use coursellm_core::{ChatMessage, ChatRole, IstHistoryItem, StudentProfile};

/// Only the most recent chat messages are rendered.
pub const MAX_CHAT_MESSAGES: usize = 10;
/// Character budget for one chat message preview.
pub const CHAT_PREVIEW_CHARS: usize = 150;
/// Only the first IST events (most recent first, as supplied) are rendered.
pub const MAX_IST_EVENTS: usize = 5;
pub const IST_INTENT_CHARS: usize = 100;
pub const MAX_EVENT_SKILLS: usize = 5;
pub const MAX_PROFILE_SKILLS: usize = 10;

pub const NO_CHAT_HISTORY: &str = "Recent chat history: (none available)";
pub const NO_IST_HISTORY: &str = "Recent IST events: (none available)";
pub const NO_PROFILE: &str = "Student learning profile: (no data available)";
pub const EMPTY_PROFILE: &str = "Student learning profile: (no detailed data available)";

/// The three rendered context sections fed to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlocks {
    pub chat_history: String,
    pub ist_history: String,
    pub student_profile: String,
}

/// Render all three context sections.
pub fn format_context(
    chat_history: &[ChatMessage],
    ist_history: &[IstHistoryItem],
    student_profile: Option<&StudentProfile>,
) -> ContextBlocks {
    ContextBlocks {
        chat_history: format_chat_history(chat_history),
        ist_history: format_ist_history(ist_history),
        student_profile: format_student_profile(student_profile),
    }
}

pub fn format_chat_history(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return NO_CHAT_HISTORY.to_string();
    }

    let skip = messages.len().saturating_sub(MAX_CHAT_MESSAGES);
    let lines: Vec<String> = messages[skip..]
        .iter()
        .map(|msg| {
            format!(
                "  {} [{}]: {}",
                role_marker(msg.role),
                msg.role.as_str(),
                preview(&msg.content, CHAT_PREVIEW_CHARS)
            )
        })
        .collect();

    format!(
        "Recent chat history ({} messages):\n{}",
        messages.len(),
        lines.join("\n")
    )
}

pub fn format_ist_history(events: &[IstHistoryItem]) -> String {
    if events.is_empty() {
        return NO_IST_HISTORY.to_string();
    }

    let entries: Vec<String> = events
        .iter()
        .take(MAX_IST_EVENTS)
        .enumerate()
        .map(|(i, event)| {
            let skills: Vec<&str> = event
                .skills
                .iter()
                .take(MAX_EVENT_SKILLS)
                .map(String::as_str)
                .collect();
            format!(
                "  {}. Intent: {}\n     Skills: {}\n     Trajectory: {} steps",
                i + 1,
                preview(&event.intent, IST_INTENT_CHARS),
                skills.join(", "),
                event.trajectory.len()
            )
        })
        .collect();

    format!(
        "Recent IST events ({} total):\n{}",
        events.len(),
        entries.join("\n")
    )
}

pub fn format_student_profile(profile: Option<&StudentProfile>) -> String {
    let Some(profile) = profile else {
        return NO_PROFILE.to_string();
    };

    let mut lines = Vec::new();
    if !profile.strong_skills.is_empty() {
        lines.push(format!(
            "  - Strong skills: {}",
            first_n(&profile.strong_skills, MAX_PROFILE_SKILLS)
        ));
    }
    if !profile.weak_skills.is_empty() {
        lines.push(format!(
            "  - Weak skills: {}",
            first_n(&profile.weak_skills, MAX_PROFILE_SKILLS)
        ));
    }
    if let Some(progress) = profile.course_progress.as_deref().filter(|p| !p.is_empty()) {
        lines.push(format!("  - Course progress: {progress}"));
    }

    if lines.is_empty() {
        return EMPTY_PROFILE.to_string();
    }
    format!("Student learning profile:\n{}", lines.join("\n"))
}

fn role_marker(role: ChatRole) -> &'static str {
    match role {
        ChatRole::Student => "👤",
        ChatRole::Tutor => "🤖",
        ChatRole::System => "⚙️",
    }
}

fn first_n(items: &[String], n: usize) -> String {
    items
        .iter()
        .take(n)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cut `text` to `max` characters, appending `...` when anything was cut.
fn preview(text: &str, max: usize) -> String {
    let (head, cut) = truncate_chars(text, max);
    if cut {
        format!("{head}...")
    } else {
        head.to_string()
    }
}

/// First `max` characters of `text` (Unicode scalar values, never a split
/// code point) and whether anything was dropped.
pub(crate) fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
