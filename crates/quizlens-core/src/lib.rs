use serde::{Deserialize, Serialize};

pub mod backend;
pub mod config;
pub mod followup;
pub mod render;
pub mod session;
pub mod stats;
pub mod store;

// Re-export for convenience
pub use backend::{
    AiBackend, AiRequest, AiResponse, SearchBackend, SearchRequest, SearchResponse, TransportError,
};
pub use followup::{AiFollowupController, AskError, AskOutcome, DeliveredAnswer, FollowupState};
pub use render::render;
pub use session::{
    SearchOutcome, SearchSession, SelectError, SelectedFile, SessionSnapshot, SessionState,
    SubmitError, SubmitOutcome,
};
pub use stats::{StatsAggregator, StatsSnapshot};
pub use store::{FavoriteEntry, HistoryEntry, PersistentStore, StoreError, UsageStats, STAT_SEARCH_COUNT};

/// Maximum accepted upload size: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Raster image media types the session accepts.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/bmp",
    "image/gif",
    "image/webp",
];

/// History is capped at this many entries, newest first.
pub const HISTORY_CAP: usize = 20;

/// Subject hint sent to the AI backend when no knowledge tag was recognized.
pub const DEFAULT_SUBJECT: &str = "高等数学";

/// Question-type hint sent to the AI backend when the search did not classify one.
pub const DEFAULT_QUESTION_TYPE: &str = "综合类";

/// A labeled topic classification attached to recognized content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeTag {
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// Estimated difficulty attached to a library match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difficulty {
    pub level: String,
    pub stars: u8,
    #[serde(default)]
    pub color: String,
}

/// The recognition result attached to a search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrSummary {
    #[serde(default)]
    pub text: String,
    /// Recognition confidence in 0..1.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub knowledge_tags: Vec<KnowledgeTag>,
    #[serde(default)]
    pub question_type: Option<String>,
}

/// Where a matched answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Database,
    Ai,
}

impl Default for AnswerSource {
    fn default() -> Self {
        AnswerSource::Database
    }
}

/// One matched solution returned by the search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub question_id: String,
    /// Similarity to the submitted question in 0..1.
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub source: AnswerSource,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub ai_model: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub knowledge_tags: Option<Vec<KnowledgeTag>>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// An on-demand answer returned by the AI backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnswer {
    pub answer: String,
    #[serde(default)]
    pub ai_model: Option<String>,
    #[serde(default = "default_ai_confidence")]
    pub confidence: f64,
}

fn default_ai_confidence() -> f64 {
    0.98
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_result_tolerates_sparse_payload() {
        let json = r#"{"question_id": "q_001", "similarity": 0.91, "answer": "42"}"#;
        let m: MatchResult = serde_json::from_str(json).unwrap();
        assert_eq!(m.question_id, "q_001");
        assert_eq!(m.source, AnswerSource::Database);
        assert!(m.category.is_none());
        assert!(m.difficulty.is_none());
    }

    #[test]
    fn answer_source_wire_names() {
        let m: MatchResult =
            serde_json::from_str(r#"{"question_id": "x", "source": "ai"}"#).unwrap();
        assert_eq!(m.source, AnswerSource::Ai);
    }

    #[test]
    fn ai_answer_confidence_defaults() {
        let a: AiAnswer = serde_json::from_str(r#"{"answer": "see steps"}"#).unwrap();
        assert!((a.confidence - 0.98).abs() < f64::EPSILON);
        assert!(a.ai_model.is_none());
    }
}
