//! Defensive JSON recovery for model replies.
//!
//! Models wrap JSON in markdown fences, chat around it, leave trailing
//! commas, or stop mid-string when they hit the token limit. Everything in
//! this module returns `Option`: a reply that cannot be recovered is
//! reported as `None` and the caller moves on to its next strategy.

use serde_json::{Map, Value};
use tracing::debug;

/// Remove a leading ```` ```json ```` (or bare ```` ``` ````) fence and a
/// trailing ```` ``` ```` fence, then trim.
///
/// Applied until nothing changes, so stripping already-stripped text is a
/// no-op.
pub fn strip_code_fence(text: &str) -> &str {
    let mut current = text.trim();
    loop {
        let mut next = current;
        if let Some(rest) = next.strip_prefix("```") {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            next = rest.strip_prefix('\n').unwrap_or(rest);
        }
        if let Some(rest) = next.strip_suffix("```") {
            next = rest.strip_suffix('\n').unwrap_or(rest);
        }
        let next = next.trim();
        if next.len() == current.len() {
            return current;
        }
        current = next;
    }
}

/// Content of the first fenced block found anywhere in `text`.
fn embedded_fence_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let end = after.find("```")?;
    Some(after[..end].trim())
}

/// Parse `text` as a JSON object, repairing it once if the strict parse
/// fails.
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fence(text);
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(cleaned) {
        debug!(strategy = "json_object", keys = map.len(), "Parsed JSON object");
        return Some(map);
    }

    if let Some(block) = embedded_fence_block(cleaned)
        && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(block)
    {
        debug!(strategy = "fenced_block", keys = map.len(), "Parsed JSON object");
        return Some(map);
    }

    let repaired = repair_json(cleaned);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) => {
            debug!(strategy = "repaired_json", keys = map.len(), "Parsed JSON object");
            Some(map)
        }
        _ => {
            debug!(chars = cleaned.chars().count(), "Text is not a JSON object");
            None
        }
    }
}

/// Parse `text` as a JSON array, repairing it once if the strict parse
/// fails.
pub fn parse_array(text: &str) -> Option<Vec<Value>> {
    let cleaned = strip_code_fence(text);
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(cleaned) {
        return Some(items);
    }

    match serde_json::from_str::<Value>(&repair_json(cleaned)) {
        Ok(Value::Array(items)) => {
            debug!(strategy = "repaired_json", items = items.len(), "Parsed JSON array");
            Some(items)
        }
        _ => None,
    }
}

/// Best-effort rewrite of almost-JSON into JSON.
///
/// Handles, in one pass:
/// - text before the first `{`/`[` and after its last matching closer
/// - single-quoted strings and raw control characters inside strings
/// - unescaped quotes inside strings
/// - bare keys and bare words (`{intent: x}`), Python literals
/// - trailing commas before a closer
/// - unterminated strings, dangling `:` and unclosed brackets/braces
///
/// The output is not guaranteed to parse; callers still check.
pub fn repair_json(text: &str) -> String {
    let body = outermost_span(text);
    let mut out = String::with_capacity(body.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => read_string(c, &mut chars, &mut out),
            '{' => {
                closers.push('}');
                out.push(c);
            }
            '[' => {
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                // A stray closer with no matching opener is dropped.
                if closers.contains(&c) {
                    while let Some(closer) = closers.pop() {
                        close_with(&mut out, closer);
                        if closer == c {
                            break;
                        }
                    }
                }
            }
            ',' | ':' => out.push(c),
            c if c.is_whitespace() => out.push(c),
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                push_word(&word, &mut out);
            }
            _ => {}
        }
    }

    while let Some(closer) = closers.pop() {
        close_with(&mut out, closer);
    }

    out
}

fn outermost_span(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find(|c| c == '{' || c == '[') else {
        return trimmed;
    };
    let close = if trimmed[start..].starts_with('{') { '}' } else { ']' };
    match trimmed.rfind(close) {
        Some(end) if end > start => &trimmed[start..=end],
        _ => &trimmed[start..],
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '+' | '$')
}

fn push_word(word: &str, out: &mut String) {
    match word {
        "true" | "false" | "null" => out.push_str(word),
        "True" => out.push_str("true"),
        "False" => out.push_str("false"),
        "None" => out.push_str("null"),
        w if w.parse::<serde_json::Number>().is_ok() => out.push_str(w),
        w => {
            out.push('"');
            out.push_str(w);
            out.push('"');
        }
    }
}

/// Copy a string literal opened by `quote`, re-quoting it with `"`.
///
/// A quote only closes the string when the next non-blank character is a
/// JSON delimiter (`,` `:` `}` `]`) or the input ends. Any other quote is
/// kept as literal text, so `"Explain the "this" keyword"` survives.
fn read_string<I>(quote: char, chars: &mut std::iter::Peekable<I>, out: &mut String)
where
    I: Iterator<Item = char> + Clone,
{
    out.push('"');
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') if quote == '\'' => out.push('\''),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => break,
            },
            c if c == quote => {
                if closes_string(chars) {
                    out.push('"');
                    return;
                }
                if quote == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push('\'');
                }
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    // Unterminated: the reply was cut off mid-string.
    out.push('"');
}

fn closes_string<I>(chars: &std::iter::Peekable<I>) -> bool
where
    I: Iterator<Item = char> + Clone,
{
    match chars.clone().find(|c| !c.is_whitespace()) {
        None => true,
        Some(next) => matches!(next, ',' | ':' | '}' | ']'),
    }
}

fn close_with(out: &mut String, closer: char) {
    let end = out.trim_end().len();
    out.truncate(end);
    if out.ends_with(',') {
        out.pop();
    }
    if out.ends_with(':') {
        out.push_str(" null");
    }
    out.push(closer);
}
