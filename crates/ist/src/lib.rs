//! Intent–skill–trajectory extraction for CourseLLM.
//!
//! The flow for one request:
//!
//! ```text
//! IstRequest ─► context::format_context ─► prompt::ist_messages
//!            ─► Provider::complete ─► normalize::normalize ─► ExtractionResult
//! ```
//!
//! Only validation and model invocation can fail. Whatever the model
//! replies, the normalizer turns it into a result with a non-empty intent
//! and non-empty skill and trajectory lists.

pub mod analysis;
pub mod cell;
pub mod context;
pub mod extractor;
pub mod json;
pub mod normalize;
pub mod prompt;

pub use analysis::{AnalysisStore, AnalyzeMessageRequest, MessageAnalysis, MessageAnalyzer, NoopAnalysisStore};
pub use cell::ExtractorCell;
pub use context::{ContextBlocks, format_context};
pub use extractor::IstExtractor;
pub use normalize::{RawModelOutput, normalize, normalize_list};
