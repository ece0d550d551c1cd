//! Prompt assembly for the extractor and the message analyzer.

use coursellm_core::{IstRequest, Message};

use crate::context::ContextBlocks;

/// Instructions for IST extraction.
pub const IST_SYSTEM_PROMPT: &str = "\
You are an IST (Intent-Skills-Trajectory) extractor for a CS tutoring system.

Your job:
- Understand what the student is trying to achieve right now (intent).
- Identify which CS skills or concepts are relevant (skills).
- Suggest next learning steps that build on this student's history (trajectory).

Consider all provided context:
- The student profile shows their strengths, weaknesses, and progress.
- The IST history shows previous learning patterns and trajectories. Do NOT repeat identical steps.
- The chat history shows the conversation flow.
- The course context provides topic/syllabus information.

You MUST always return:
  - intent: 1 short English sentence describing what the student is trying to do or ask.
  - skills: 3-7 key CS skills or concepts as an array of strings.
  - trajectory: 3-5 concrete next learning steps that build on (not repeat) previous trajectories.

Never leave skills or trajectory empty.
The utterance may be in Hebrew or any other language; always answer in English.
Return ONLY a JSON object with keys: intent, skills, trajectory.";

/// Instructions for the message analysis endpoint.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "\
You analyze a single student message in the context of a tutoring thread.
The input is a JSON object with messageText, recentMessages, studentProfile,
graphSnippet and language.

Return ONLY a JSON object with at least:
  - intent: 1 short sentence describing what the student wants.
  - skills: array of strings naming the concepts involved.
You may add further fields describing the message.";

/// Build the extraction prompt: instructions plus one labelled section per
/// input field.
pub fn ist_messages(request: &IstRequest, blocks: &ContextBlocks) -> Vec<Message> {
    let user = [
        section("utterance", &request.utterance),
        section("course_context", request.course_context_or_empty()),
        section("chat_history", &blocks.chat_history),
        section("ist_history", &blocks.ist_history),
        section("student_profile", &blocks.student_profile),
        "Respond with a JSON object containing \"intent\", \"skills\" and \"trajectory\".".to_string(),
    ]
    .join("\n\n");

    vec![Message::system(IST_SYSTEM_PROMPT), Message::user(user)]
}

/// Build the analysis prompt around a pre-assembled JSON input.
pub fn analysis_messages(input: &serde_json::Value) -> Vec<Message> {
    let body = serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string());
    vec![Message::system(ANALYSIS_SYSTEM_PROMPT), Message::user(body)]
}

fn section(name: &str, body: &str) -> String {
    format!("[[ ## {name} ## ]]\n{body}")
}
