//! External collaborator traits and their HTTP implementations.
//!
//! The recognition/search service and the AI-answer service are black
//! boxes behind [`SearchBackend`] and [`AiBackend`]. The concrete types
//! here speak the original HTTP API (`/api/search` multipart upload,
//! `/api/ask_ai` JSON); [`mock`] provides configurable fakes for tests.

pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{MatchResult, OcrSummary};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport-level failure: non-2xx status or a network error. A success
/// response whose payload reports failure is not a transport error.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
}

/// One search submission: the image plus the optional college filter and
/// the AI-enable flag.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub image: Vec<u8>,
    pub file_name: String,
    pub media_type: String,
    /// Empty string means no filter.
    pub college: String,
    pub use_ai: bool,
}

/// Search service response envelope. `success: false` carries `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(default)]
    pub ocr_result: Option<OcrSummary>,
    #[serde(default)]
    pub results: Vec<MatchResult>,
    #[serde(default)]
    pub ai_triggered: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// One AI follow-up ask: recognized text plus best-effort hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRequest {
    pub text: String,
    pub subject: String,
    pub question_type: String,
}

/// AI service response envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiResponse {
    pub success: bool,
    #[serde(default)]
    pub ai_answer: Option<crate::AiAnswer>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The recognition/search service.
pub trait SearchBackend: Send + Sync {
    /// Canonical name for logging.
    fn name(&self) -> &str;

    fn search<'a>(
        &'a self,
        request: &'a SearchRequest,
    ) -> BoxFuture<'a, Result<SearchResponse, TransportError>>;
}

/// The on-demand AI answer service.
pub trait AiBackend: Send + Sync {
    fn name(&self) -> &str;

    fn ask<'a>(
        &'a self,
        request: &'a AiRequest,
    ) -> BoxFuture<'a, Result<AiResponse, TransportError>>;
}

/// `SearchBackend` over the original HTTP API: multipart POST to
/// `{base}/api/search` with `file`, `college` and `use_ai` fields.
pub struct HttpSearchBackend {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSearchBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    /// Share an existing client between backends.
    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        }
    }
}

impl SearchBackend for HttpSearchBackend {
    fn name(&self) -> &str {
        "search"
    }

    fn search<'a>(
        &'a self,
        request: &'a SearchRequest,
    ) -> BoxFuture<'a, Result<SearchResponse, TransportError>> {
        Box::pin(async move {
            let part = reqwest::multipart::Part::bytes(request.image.clone())
                .file_name(request.file_name.clone())
                .mime_str(&request.media_type)
                .map_err(|e| TransportError::Network(e.to_string()))?;
            let form = reqwest::multipart::Form::new()
                .part("file", part)
                .text("college", request.college.clone())
                .text("use_ai", if request.use_ai { "true" } else { "false" });

            let resp = self
                .client
                .post(format!("{}/api/search", self.base_url))
                .multipart(form)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }

            resp.json::<SearchResponse>()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))
        })
    }
}

/// `AiBackend` over the original HTTP API: JSON POST to `{base}/api/ask_ai`.
pub struct HttpAiBackend {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpAiBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        }
    }
}

impl AiBackend for HttpAiBackend {
    fn name(&self) -> &str {
        "ai"
    }

    fn ask<'a>(
        &'a self,
        request: &'a AiRequest,
    ) -> BoxFuture<'a, Result<AiResponse, TransportError>> {
        Box::pin(async move {
            let resp = self
                .client
                .post(format!("{}/api/ask_ai", self.base_url))
                .json(request)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }

            resp.json::<AiResponse>()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_decodes_backend_payload() {
        let json = r##"{
            "success": true,
            "ocr_result": {
                "text": "求函数 f(x) = x² + 2x + 1 的最小值",
                "confidence": 0.93,
                "knowledge_tags": [{"name": "高等数学", "color": "#007bff"}],
                "question_type": "求解类"
            },
            "results": [
                {"question_id": "hust_001", "similarity": 0.95, "source": "database",
                 "category": "高等数学", "answer": "配方可得最小值 0"}
            ],
            "ai_triggered": false
        }"##;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        let ocr = resp.ocr_result.unwrap();
        assert_eq!(ocr.knowledge_tags[0].name, "高等数学");
        assert_eq!(ocr.question_type.as_deref(), Some("求解类"));
        assert_eq!(resp.results.len(), 1);
    }

    #[test]
    fn failure_envelope_decodes() {
        let resp: SearchResponse =
            serde_json::from_str(r#"{"success": false, "error": "不支持的文件类型"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("不支持的文件类型"));
        assert!(resp.results.is_empty());
    }

    #[test]
    fn ai_request_serializes_wire_fields() {
        let req = AiRequest {
            text: "证明 lim(x→0) sinx/x = 1".into(),
            subject: "高等数学".into(),
            question_type: "证明类".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("text").is_some());
        assert!(value.get("subject").is_some());
        assert!(value.get("question_type").is_some());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let b = HttpSearchBackend::new("http://localhost:5000/", Duration::from_secs(5));
        assert_eq!(b.base_url, "http://localhost:5000");
    }
}
