//! Response normalizer: raw model output in, well-formed extraction out.
//!
//! The pipeline has three stages, each returning `Option` so a failed
//! strategy simply yields to the next one:
//!
//! 1. **Locate** the `intent`, `skills` and `trajectory` values: a JSON
//!    object (possibly fenced, possibly malformed, possibly nested under
//!    `structured_analysis`) or labelled sections in plain text.
//! 2. **Normalize** each value: intent to a trimmed string, lists through
//!    [`normalize_list`]'s fallback chain.
//! 3. **Synthesize** defaults for anything still missing.
//!
//! [`normalize`] never fails and never returns an empty collection.

use coursellm_core::ExtractionResult;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::truncate_chars;
use crate::json;

pub const FALLBACK_INTENT: &str = "Student is asking for help with a course concept.";

pub const FALLBACK_TRAJECTORY: [&str; 3] = [
    "Review the relevant lecture notes or slides.",
    "Watch a short explanation video on this topic.",
    "Solve 1–3 simple practice problems about this topic.",
];

/// Intent characters quoted in the synthesized skill.
const FALLBACK_SKILL_INTENT_CHARS: usize = 50;

/// Key some structured-output adapters nest the whole reply under.
const NESTED_KEY: &str = "structured_analysis";

/// Raw model output, tagged by shape.
#[derive(Debug, Clone)]
pub enum RawModelOutput {
    /// A completion string, possibly fenced or malformed JSON, or prose.
    Text(String),
    /// Already-decoded named fields.
    Structured(Map<String, Value>),
}

/// Field values as found, before normalization.
#[derive(Debug, Default)]
struct RawFields {
    intent: Option<Value>,
    skills: Option<Value>,
    trajectory: Option<Value>,
}

impl RawFields {
    fn is_complete(&self) -> bool {
        self.intent.is_some() && self.skills.is_some() && self.trajectory.is_some()
    }

    fn is_empty(&self) -> bool {
        self.intent.is_none() && self.skills.is_none() && self.trajectory.is_none()
    }

    /// Take each field from `other` only where this one is still missing.
    fn fill_from(&mut self, other: RawFields) {
        if self.intent.is_none() {
            self.intent = other.intent;
        }
        if self.skills.is_none() {
            self.skills = other.skills;
        }
        if self.trajectory.is_none() {
            self.trajectory = other.trajectory;
        }
    }

    fn set(&mut self, name: &str, value: Value) {
        let slot = match name {
            "intent" => &mut self.intent,
            "skills" => &mut self.skills,
            "trajectory" => &mut self.trajectory,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

/// Turn any model output into a valid [`ExtractionResult`].
pub fn normalize(raw: &RawModelOutput) -> ExtractionResult {
    let fields = locate_fields(raw);

    let intent = match normalize_intent(fields.intent.as_ref()) {
        Some(intent) => intent,
        None => {
            warn!(fallback = "intent", "Model output carried no intent");
            FALLBACK_INTENT.to_string()
        }
    };

    let mut skills = fields.skills.as_ref().map(normalize_list).unwrap_or_default();
    if skills.is_empty() {
        warn!(fallback = "skills", "Model output carried no skills");
        skills = vec![fallback_skill(&intent)];
    }

    let mut trajectory = fields
        .trajectory
        .as_ref()
        .map(normalize_list)
        .unwrap_or_default();
    if trajectory.is_empty() {
        warn!(fallback = "trajectory", "Model output carried no trajectory");
        trajectory = FALLBACK_TRAJECTORY.iter().map(|s| s.to_string()).collect();
    }

    ExtractionResult {
        intent,
        skills,
        trajectory,
    }
}

fn fallback_skill(intent: &str) -> String {
    let (head, _) = truncate_chars(intent, FALLBACK_SKILL_INTENT_CHARS);
    format!("Understand: {}", head.trim_end())
}

fn locate_fields(raw: &RawModelOutput) -> RawFields {
    match raw {
        RawModelOutput::Structured(map) => fields_from_object(map),
        RawModelOutput::Text(text) => {
            let mut fields = json::parse_object(text)
                .map(|map| fields_from_object(&map))
                .unwrap_or_default();
            if fields.is_complete() {
                return fields;
            }

            // An object that is missing fields (or is unrelated prose braces)
            // yields to the text sections for whatever is still absent.
            fields.fill_from(marker_sections(text));
            if !fields.is_complete() {
                fields.fill_from(line_label_sections(text));
            }
            if fields.is_empty() {
                debug!(chars = text.chars().count(), "No recognizable fields in model output");
            } else {
                debug!(strategy = "labelled_sections", "Located fields in plain text");
            }
            fields
        }
    }
}

fn fields_from_object(map: &Map<String, Value>) -> RawFields {
    let mut fields = RawFields {
        intent: present(map.get("intent")),
        skills: present(map.get("skills")),
        trajectory: present(map.get("trajectory")),
    };

    if !fields.is_complete()
        && let Some(nested) = map.get(NESTED_KEY)
    {
        let nested = match nested {
            Value::Object(obj) => Some(obj.clone()),
            Value::String(s) => json::parse_object(s),
            _ => None,
        };
        if let Some(nested) = nested {
            debug!(strategy = NESTED_KEY, "Reading fields from nested object");
            fields.fill_from(fields_from_object(&nested));
        }
    }

    fields.intent = fields.intent.map(|v| unwrap_embedded("intent", v));
    fields.skills = fields.skills.map(|v| unwrap_embedded("skills", v));
    fields.trajectory = fields.trajectory.map(|v| unwrap_embedded("trajectory", v));
    fields
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

/// A field value that is itself an object carrying the same key, either
/// decoded or as a JSON string, is replaced by that inner value.
fn unwrap_embedded(key: &str, value: Value) -> Value {
    let inner = match &value {
        Value::Object(obj) => obj.get(key).cloned(),
        Value::String(s) if s.trim_start().starts_with('{') => {
            json::parse_object(s).and_then(|obj| obj.get(key).cloned())
        }
        _ => None,
    };
    match inner {
        Some(inner) if !inner.is_null() => {
            debug!(strategy = "embedded_object", field = key, "Unwrapped embedded field");
            inner
        }
        _ => value,
    }
}

/// `[[ ## intent ## ]]` style sections, each running to the next marker.
fn marker_sections(text: &str) -> RawFields {
    let mut fields = RawFields::default();
    for segment in text.split("[[ ##").skip(1) {
        let Some(end) = segment.find("## ]]") else {
            continue;
        };
        let name = segment[..end].trim().to_lowercase();
        let body = segment[end + "## ]]".len()..].trim();
        if !body.is_empty() {
            fields.set(&name, Value::String(body.to_string()));
        }
    }
    fields
}

/// `intent: ...` style sections. A label starts a section that runs until
/// the next recognized label.
fn line_label_sections(text: &str) -> RawFields {
    let mut fields = RawFields::default();
    let mut current: Option<(&'static str, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some((name, rest)) = split_label(line) {
            if let Some((prev, body)) = current.take() {
                set_body(&mut fields, prev, &body);
            }
            current = Some((name, vec![rest]));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((prev, body)) = current {
        set_body(&mut fields, prev, &body);
    }
    fields
}

fn split_label(line: &str) -> Option<(&'static str, &str)> {
    let line = line.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '*' | '-'));
    let (label, rest) = line.split_once(':')?;
    let label = label.trim_matches(|c: char| c.is_whitespace() || c == '*');
    let name = ["intent", "skills", "trajectory"]
        .into_iter()
        .find(|name| label.eq_ignore_ascii_case(name))?;
    Some((name, rest))
}

fn set_body(fields: &mut RawFields, name: &str, lines: &[&str]) {
    let body = lines.join("\n");
    let body = body.trim();
    if !body.is_empty() {
        fields.set(name, Value::String(body.to_string()));
    }
}

/// Trim the intent; non-string values are stringified. Blank is absent.
pub fn normalize_intent(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Normalize a list-ish value into trimmed, non-empty strings.
///
/// Arrays are taken element by element. Strings are tried as a JSON array
/// first when bracket-delimited, then split on newlines, commas and
/// semicolons with bullet markers removed. Anything else yields nothing.
pub fn normalize_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => {
            debug!(strategy = "array", items = items.len(), "Normalizing list");
            clean_items(items)
        }
        Value::String(s) => {
            let text = s.trim();
            if text.starts_with('[')
                && text.ends_with(']')
                && let Some(items) = json::parse_array(text)
            {
                let cleaned = clean_items(&items);
                if !cleaned.is_empty() {
                    debug!(strategy = "json_array", items = cleaned.len(), "Normalizing list");
                    return cleaned;
                }
            }
            let pieces = split_text_list(text);
            debug!(strategy = "string_split", items = pieces.len(), "Normalizing list");
            pieces
        }
        other => {
            debug!(kind = json_kind(other), "Cannot normalize value into a list");
            Vec::new()
        }
    }
}

fn clean_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string().trim().to_string(),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_text_list(text: &str) -> Vec<String> {
    let text = text
        .trim_matches(|c| matches!(c, '[' | ']' | '"' | '\''))
        .replace('\r', "\n");

    let mut pieces = Vec::new();
    for line in text.split('\n') {
        let line = line.trim_matches(|c| matches!(c, ' ' | '-' | '•' | '\t'));
        if line.is_empty() {
            continue;
        }
        for chunk in line.split([',', ';']) {
            let chunk =
                chunk.trim_matches(|c| matches!(c, ' ' | '-' | '•' | '\t' | '"' | '\'' | '[' | ']'));
            if !chunk.is_empty() {
                pieces.push(chunk.to_string());
            }
        }
    }
    pieces
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
