//! Message analysis: analyze one message of a tutoring thread.
//!
//! Context loading and persistence go through [`AnalysisStore`]; the
//! bundled [`NoopAnalysisStore`] loads nothing and saves nothing.

use std::sync::Arc;

use async_trait::async_trait;
use coursellm_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::extractor::IstExtractor;
use crate::json::parse_object;
use crate::normalize::{normalize_intent, normalize_list};
use crate::prompt;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_MAX_HISTORY_MESSAGES: i64 = 10;
pub const MAX_HISTORY_MESSAGES_LIMIT: i64 = 100;

/// Body of `POST /analyze-message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeMessageRequest {
    pub thread_id: String,
    pub message_text: String,
    #[serde(default)]
    pub message_id: Option<String>,
    pub course_id: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub max_history_messages: Option<i64>,
}

impl AnalyzeMessageRequest {
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    /// History window, rejected outside `1..=100`.
    pub fn history_limit(&self) -> Result<usize> {
        let limit = self
            .max_history_messages
            .unwrap_or(DEFAULT_MAX_HISTORY_MESSAGES);
        if !(1..=MAX_HISTORY_MESSAGES_LIMIT).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "maxHistoryMessages must be between 1 and {MAX_HISTORY_MESSAGES_LIMIT}, got {limit}"
            )));
        }
        Ok(limit as usize)
    }
}

/// A message loaded from a thread's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub role: String,
    pub content: String,
}

/// The stored and returned analysis.
///
/// Fields the model adds beyond intent and skills are kept in `extra`
/// and flattened on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAnalysis {
    pub uid: String,
    pub thread_id: String,
    pub message_id: String,
    pub intent: String,
    pub skills: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where analysis context comes from and where results go.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn load_recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<ThreadMessage>>;

    async fn load_student_profile(&self, user_id: &str) -> Result<Map<String, Value>>;

    async fn load_graph_snippet(&self, course_id: &str) -> Result<Map<String, Value>>;

    async fn save_analysis(
        &self,
        thread_id: &str,
        message_id: &str,
        analysis: &MessageAnalysis,
    ) -> Result<()>;
}

/// Store that loads empty context and discards results.
pub struct NoopAnalysisStore;

#[async_trait]
impl AnalysisStore for NoopAnalysisStore {
    async fn load_recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<ThreadMessage>> {
        debug!(thread_id, limit, "No message store configured, loading no history");
        Ok(Vec::new())
    }

    async fn load_student_profile(&self, user_id: &str) -> Result<Map<String, Value>> {
        debug!(user_id, "No profile store configured, loading empty profile");
        Ok(Map::new())
    }

    async fn load_graph_snippet(&self, course_id: &str) -> Result<Map<String, Value>> {
        debug!(course_id, "No graph store configured, loading empty snippet");
        Ok(Map::new())
    }

    async fn save_analysis(
        &self,
        thread_id: &str,
        message_id: &str,
        _analysis: &MessageAnalysis,
    ) -> Result<()> {
        debug!(thread_id, message_id, "No analysis store configured, discarding analysis");
        Ok(())
    }
}

/// Runs the analysis flow against a store.
pub struct MessageAnalyzer {
    store: Arc<dyn AnalysisStore>,
}

impl MessageAnalyzer {
    pub fn new(store: Arc<dyn AnalysisStore>) -> Self {
        Self { store }
    }

    /// Analyzer backed by [`NoopAnalysisStore`].
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopAnalysisStore))
    }

    pub async fn analyze(
        &self,
        extractor: &IstExtractor,
        user_id: &str,
        request: &AnalyzeMessageRequest,
    ) -> Result<MessageAnalysis> {
        let limit = request.history_limit()?;
        let message_id = request
            .message_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("analysis-{}", chrono::Utc::now().timestamp_millis()));

        info!(
            thread_id = %request.thread_id,
            message_id = %message_id,
            course_id = %request.course_id,
            "Analyzing message"
        );

        let recent_messages = self
            .store
            .load_recent_messages(&request.thread_id, limit)
            .await?;
        let student_profile = self.store.load_student_profile(user_id).await?;
        let graph_snippet = self.store.load_graph_snippet(&request.course_id).await?;

        let input = json!({
            "messageText": request.message_text,
            "recentMessages": recent_messages,
            "studentProfile": student_profile,
            "graphSnippet": graph_snippet,
            "language": request.language(),
        });

        let reply = extractor
            .complete_json(prompt::analysis_messages(&input))
            .await?;
        let raw = parse_object(&reply).unwrap_or_default();

        let analysis = build_analysis(raw, user_id, &request.thread_id, &message_id);
        self.store
            .save_analysis(&request.thread_id, &message_id, &analysis)
            .await?;
        Ok(analysis)
    }
}

/// Merge caller metadata over the model's fields.
fn build_analysis(
    mut raw: Map<String, Value>,
    user_id: &str,
    thread_id: &str,
    message_id: &str,
) -> MessageAnalysis {
    let intent = normalize_intent(raw.get("intent")).unwrap_or_default();
    let skills = raw.get("skills").map(normalize_list).unwrap_or_default();
    for key in ["intent", "skills", "uid", "thread_id", "message_id"] {
        raw.remove(key);
    }

    MessageAnalysis {
        uid: user_id.to_string(),
        thread_id: thread_id.to_string(),
        message_id: message_id.to_string(),
        intent,
        skills,
        extra: raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursellm_core::{Message, Provider, ProviderError, ProviderRequest, ProviderResponse};
    use std::sync::Mutex;

    struct FixedProvider(&'static str);

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(self.0),
                usage: None,
                model: "fixed".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        limits: Mutex<Vec<usize>>,
        saved: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AnalysisStore for RecordingStore {
        async fn load_recent_messages(&self, _thread_id: &str, limit: usize) -> Result<Vec<ThreadMessage>> {
            self.limits.lock().unwrap().push(limit);
            Ok(vec![ThreadMessage {
                role: "user".into(),
                content: "earlier question".into(),
            }])
        }

        async fn load_student_profile(&self, _user_id: &str) -> Result<Map<String, Value>> {
            Ok(Map::new())
        }

        async fn load_graph_snippet(&self, _course_id: &str) -> Result<Map<String, Value>> {
            Ok(Map::new())
        }

        async fn save_analysis(
            &self,
            thread_id: &str,
            message_id: &str,
            _analysis: &MessageAnalysis,
        ) -> Result<()> {
            self.saved
                .lock()
                .unwrap()
                .push((thread_id.to_string(), message_id.to_string()));
            Ok(())
        }
    }

    fn request(json: &str) -> AnalyzeMessageRequest {
        serde_json::from_str(json).unwrap()
    }

    fn extractor(reply: &'static str) -> IstExtractor {
        IstExtractor::new(Arc::new(FixedProvider(reply)), "m")
    }

    #[test]
    fn camel_case_request_with_defaults() {
        let req = request(r#"{"threadId":"t1","messageText":"hi","courseId":"cs101"}"#);
        assert_eq!(req.thread_id, "t1");
        assert_eq!(req.language(), "en");
        assert_eq!(req.history_limit().unwrap(), 10);
        assert!(req.message_id.is_none());
    }

    #[test]
    fn history_limit_bounds() {
        for bad in [0, -3, 101] {
            let req = request(&format!(
                r#"{{"threadId":"t","messageText":"m","courseId":"c","maxHistoryMessages":{bad}}}"#
            ));
            assert!(matches!(req.history_limit(), Err(Error::InvalidInput(_))));
        }
        let req = request(r#"{"threadId":"t","messageText":"m","courseId":"c","maxHistoryMessages":100}"#);
        assert_eq!(req.history_limit().unwrap(), 100);
    }

    #[tokio::test]
    async fn analysis_merges_metadata_over_reply() {
        let store = Arc::new(RecordingStore::default());
        let analyzer = MessageAnalyzer::new(store.clone());
        let req = request(
            r#"{"threadId":"t1","messageText":"Why O(n log n)?","messageId":"m7","courseId":"algo","maxHistoryMessages":5}"#,
        );
        let extractor = extractor(
            "```json\n{\"intent\": \"Understand merge sort cost\", \"skills\": \"Recurrences, Big-O\", \"uid\": \"spoofed\", \"confidence\": 0.8}\n```",
        );

        let analysis = analyzer.analyze(&extractor, "test_user_id", &req).await.unwrap();
        assert_eq!(analysis.uid, "test_user_id");
        assert_eq!(analysis.thread_id, "t1");
        assert_eq!(analysis.message_id, "m7");
        assert_eq!(analysis.intent, "Understand merge sort cost");
        assert_eq!(analysis.skills, vec!["Recurrences", "Big-O"]);
        assert_eq!(analysis.extra.get("confidence"), Some(&json!(0.8)));
        assert!(!analysis.extra.contains_key("uid"));

        assert_eq!(*store.limits.lock().unwrap(), vec![5]);
        assert_eq!(
            *store.saved.lock().unwrap(),
            vec![("t1".to_string(), "m7".to_string())]
        );
    }

    #[tokio::test]
    async fn missing_message_id_is_generated() {
        let analyzer = MessageAnalyzer::noop();
        let req = request(r#"{"threadId":"t","messageText":"m","courseId":"c"}"#);
        let analysis = analyzer
            .analyze(&extractor("{}"), "u", &req)
            .await
            .unwrap();
        assert!(analysis.message_id.starts_with("analysis-"));
        assert!(analysis.message_id["analysis-".len()..].parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn unparseable_reply_yields_empty_fields() {
        let analyzer = MessageAnalyzer::noop();
        let req = request(r#"{"threadId":"t","messageText":"m","courseId":"c","messageId":"x"}"#);
        let analysis = analyzer
            .analyze(&extractor("not json at all"), "u", &req)
            .await
            .unwrap();
        assert_eq!(analysis.intent, "");
        assert!(analysis.skills.is_empty());
        assert!(analysis.extra.is_empty());
    }

    #[tokio::test]
    async fn invalid_limit_skips_model_call() {
        let analyzer = MessageAnalyzer::noop();
        let req = request(r#"{"threadId":"t","messageText":"m","courseId":"c","maxHistoryMessages":0}"#);
        let err = analyzer
            .analyze(&extractor("{}"), "u", &req)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn analysis_serializes_flat() {
        let mut extra = Map::new();
        extra.insert("sentiment".into(), json!("confused"));
        let analysis = MessageAnalysis {
            uid: "u".into(),
            thread_id: "t".into(),
            message_id: "m".into(),
            intent: "i".into(),
            skills: vec!["s".into()],
            extra,
        };
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["sentiment"], "confused");
        assert_eq!(value["thread_id"], "t");
    }
}
