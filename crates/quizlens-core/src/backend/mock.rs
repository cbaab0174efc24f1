//! Configurable mock backends for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{
    AiBackend, AiRequest, AiResponse, BoxFuture, SearchBackend, SearchRequest, SearchResponse,
    TransportError,
};
use crate::{AiAnswer, KnowledgeTag, MatchResult, OcrSummary};

/// A mock [`SearchBackend`] returning canned responses.
///
/// Supports a fixed response, or a sequence (one per call, repeating the
/// last), optional per-call latency, and call counting.
pub struct MockSearchBackend {
    responses: Mutex<Vec<Result<SearchResponse, TransportError>>>,
    fallback: Result<SearchResponse, TransportError>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockSearchBackend {
    /// Create a mock that always returns `response`.
    pub fn always(response: Result<SearchResponse, TransportError>) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<Result<SearchResponse, TransportError>>) -> Self {
        assert!(!responses.is_empty(), "sequence must have at least one response");
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        Self {
            responses: Mutex::new(responses),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `search()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<SearchResponse, TransportError> {
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl SearchBackend for MockSearchBackend {
    fn name(&self) -> &str {
        "mock-search"
    }

    fn search<'a>(
        &'a self,
        _request: &'a SearchRequest,
    ) -> BoxFuture<'a, Result<SearchResponse, TransportError>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            response
        })
    }
}

/// A mock [`AiBackend`] with the same knobs as [`MockSearchBackend`].
pub struct MockAiBackend {
    responses: Mutex<Vec<Result<AiResponse, TransportError>>>,
    fallback: Result<AiResponse, TransportError>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    /// Requests seen, for asserting hint resolution.
    requests: Mutex<Vec<AiRequest>>,
}

impl MockAiBackend {
    pub fn always(response: Result<AiResponse, TransportError>) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sequence(mut responses: Vec<Result<AiResponse, TransportError>>) -> Self {
        assert!(!responses.is_empty(), "sequence must have at least one response");
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        Self {
            responses: Mutex::new(responses),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Copies of every request this mock has received.
    pub fn requests(&self) -> Vec<AiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<AiResponse, TransportError> {
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl AiBackend for MockAiBackend {
    fn name(&self) -> &str {
        "mock-ai"
    }

    fn ask<'a>(
        &'a self,
        request: &'a AiRequest,
    ) -> BoxFuture<'a, Result<AiResponse, TransportError>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            response
        })
    }
}

/// A successful search response with the given recognized text and matches.
pub fn ok_search(text: &str, results: Vec<MatchResult>) -> SearchResponse {
    SearchResponse {
        success: true,
        ocr_result: Some(OcrSummary {
            text: text.to_string(),
            confidence: 0.9,
            knowledge_tags: vec![KnowledgeTag {
                name: "高等数学".into(),
                color: "#007bff".into(),
            }],
            question_type: Some("求解类".into()),
        }),
        results,
        ai_triggered: false,
        error: None,
    }
}

/// A success-transport response whose payload reports failure.
pub fn failed_search(message: &str) -> SearchResponse {
    SearchResponse {
        success: false,
        error: Some(message.to_string()),
        ..SearchResponse::default()
    }
}

/// A library match with the given id and answer text.
pub fn db_match(question_id: &str, answer: &str) -> MatchResult {
    MatchResult {
        question_id: question_id.to_string(),
        similarity: 0.92,
        source: crate::AnswerSource::Database,
        category: Some("高等数学".into()),
        ai_model: None,
        difficulty: None,
        knowledge_tags: None,
        confidence: Some(0.9),
        answer: answer.to_string(),
        image_url: None,
    }
}

/// A successful AI answer envelope.
pub fn ok_ai(answer: &str) -> AiResponse {
    AiResponse {
        success: true,
        ai_answer: Some(AiAnswer {
            answer: answer.to_string(),
            ai_model: Some("DeepSeek".into()),
            confidence: 0.98,
        }),
        error: None,
    }
}
