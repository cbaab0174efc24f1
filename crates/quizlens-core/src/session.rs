//! One upload-to-results interaction cycle.
//!
//! [`SearchSession`] owns the transient [`SessionContext`] (selected file,
//! college filter, last recognition result) and drives a single-flight
//! request against the search backend. History and stats writes are
//! best-effort: the in-memory context is cached before persistence so the
//! AI follow-up keeps working even when the store is unavailable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::backend::{SearchBackend, SearchRequest, TransportError};
use crate::store::{PersistentStore, StoreError, STAT_SEARCH_COUNT};
use crate::{KnowledgeTag, MatchResult, OcrSummary, ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES};

/// Request lifecycle state. `Validating` is instantaneous (pure checks),
/// so the session only ever rests in one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

/// The selected image blob and its declared metadata.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub media_type: String,
}

/// Transient per-session state. Reset on explicit clear; populated as the
/// user selects a file and as a search completes.
#[derive(Debug, Default)]
struct SessionContext {
    file: Option<SelectedFile>,
    college: String,
    last_text: Option<String>,
    last_tags: Vec<KnowledgeTag>,
    last_question_type: Option<String>,
}

/// Read-only copy of the context, taken at trigger time by the follow-up
/// controller.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub has_file: bool,
    pub college: String,
    pub recognized_text: Option<String>,
    pub knowledge_tags: Vec<KnowledgeTag>,
    pub question_type: Option<String>,
}

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("unsupported media type: {0}")]
    InvalidMediaType(String),
    #[error("file is {0} bytes, over the 10 MiB limit")]
    OversizeMedia(u64),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("no file selected")]
    NoFileSelected,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("search failed: {0}")]
    BackendReportedFailure(String),
}

/// A completed search, handed to the renderer by the caller.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub ocr: OcrSummary,
    pub results: Vec<MatchResult>,
    pub ai_triggered: bool,
}

/// What `submit()` did.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// A submission was already in flight; this call was a no-op and no
    /// backend request was issued.
    AlreadyInFlight,
    Completed(SearchOutcome),
}

pub struct SearchSession {
    backend: Arc<dyn SearchBackend>,
    store: PersistentStore,
    use_ai: AtomicBool,
    state: Mutex<SessionState>,
    context: Mutex<SessionContext>,
}

impl SearchSession {
    pub fn new(backend: Arc<dyn SearchBackend>, store: PersistentStore) -> Self {
        Self {
            backend,
            store,
            use_ai: AtomicBool::new(true),
            state: Mutex::new(SessionState::Idle),
            context: Mutex::new(SessionContext::default()),
        }
    }

    /// Whether the search request asks the backend for an inline AI match.
    pub fn set_use_ai(&self, use_ai: bool) {
        self.use_ai.store(use_ai, Ordering::SeqCst);
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Validate and stage an image for submission.
    ///
    /// Fails with [`SelectError::InvalidMediaType`] unless the declared type
    /// is an allowed raster format, or [`SelectError::OversizeMedia`] past
    /// 10 MiB. A failed selection leaves any previous selection untouched.
    pub fn select_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        media_type: &str,
    ) -> Result<(), SelectError> {
        if !ALLOWED_IMAGE_TYPES.contains(&media_type) {
            return Err(SelectError::InvalidMediaType(media_type.to_string()));
        }
        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(SelectError::OversizeMedia(bytes.len() as u64));
        }

        tracing::debug!(file = file_name, size = bytes.len(), "file selected");
        self.context.lock().unwrap().file = Some(SelectedFile {
            bytes,
            file_name: file_name.to_string(),
            media_type: media_type.to_string(),
        });
        *self.state.lock().unwrap() = SessionState::Idle;
        Ok(())
    }

    /// Set the college filter. Empty string means no filter.
    pub fn set_college(&self, college: &str) {
        self.context.lock().unwrap().college = college.to_string();
    }

    pub fn college(&self) -> String {
        self.context.lock().unwrap().college.clone()
    }

    /// Whether a submission is currently possible.
    pub fn search_enabled(&self) -> bool {
        self.context.lock().unwrap().file.is_some()
    }

    /// Reset the context to empty and return to `Idle`.
    pub fn clear(&self) {
        *self.context.lock().unwrap() = SessionContext::default();
        *self.state.lock().unwrap() = SessionState::Idle;
    }

    pub fn context_snapshot(&self) -> SessionSnapshot {
        let ctx = self.context.lock().unwrap();
        SessionSnapshot {
            has_file: ctx.file.is_some(),
            college: ctx.college.clone(),
            recognized_text: ctx.last_text.clone(),
            knowledge_tags: ctx.last_tags.clone(),
            question_type: ctx.last_question_type.clone(),
        }
    }

    /// Toggle a result in the favorites collection. Returns whether it is
    /// now favorited. Storage failure is surfaced for the caller to treat
    /// as non-fatal.
    pub fn toggle_favorite(&self, result: &MatchResult) -> Result<bool, StoreError> {
        self.store.toggle_favorite(
            &result.question_id,
            &result.answer,
            result.category.as_deref().unwrap_or(""),
        )
    }

    /// Submit the staged image to the search backend.
    ///
    /// Single-flight: a second call while a request is outstanding is a
    /// no-op. On success the context is cached, then exactly one history
    /// entry is appended and the search counter bumped (both best-effort),
    /// in that order. An empty match list is a completed search, not a
    /// failure.
    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError> {
        let request = {
            let mut state = self.state.lock().unwrap();
            if *state == SessionState::InFlight {
                tracing::debug!("submit ignored, request already in flight");
                return Ok(SubmitOutcome::AlreadyInFlight);
            }

            let ctx = self.context.lock().unwrap();
            let file = ctx.file.as_ref().ok_or(SubmitError::NoFileSelected)?;
            let request = SearchRequest {
                image: file.bytes.clone(),
                file_name: file.file_name.clone(),
                media_type: file.media_type.clone(),
                college: ctx.college.clone(),
                use_ai: self.use_ai.load(Ordering::SeqCst),
            };
            *state = SessionState::InFlight;
            request
        };

        tracing::info!(
            backend = self.backend.name(),
            file = %request.file_name,
            college = %request.college,
            "submitting search"
        );

        let response = match self.backend.search(&request).await {
            Ok(response) => response,
            Err(e) => {
                *self.state.lock().unwrap() = SessionState::Failed;
                return Err(e.into());
            }
        };

        if !response.success {
            *self.state.lock().unwrap() = SessionState::Failed;
            let message = response.error.unwrap_or_else(|| "search failed".to_string());
            return Err(SubmitError::BackendReportedFailure(message));
        }

        let ocr = response.ocr_result.unwrap_or_default();

        // Cache context before any persistence so the follow-up controller
        // has the recognized text even if the store is unavailable.
        {
            let mut ctx = self.context.lock().unwrap();
            ctx.last_text = (!ocr.text.is_empty()).then(|| ocr.text.clone());
            ctx.last_tags = ocr.knowledge_tags.clone();
            ctx.last_question_type = ocr.question_type.clone();
        }

        if let Err(e) =
            self.store
                .push_history(&request.file_name, response.results.len(), &request.college)
        {
            tracing::warn!(error = %e, "history append failed, continuing");
        }
        if let Err(e) = self.store.bump_stat(STAT_SEARCH_COUNT) {
            tracing::warn!(error = %e, "stat update failed, continuing");
        }

        *self.state.lock().unwrap() = SessionState::Succeeded;
        Ok(SubmitOutcome::Completed(SearchOutcome {
            ocr,
            results: response.results,
            ai_triggered: response.ai_triggered,
        }))
    }
}
