//! On-demand AI answer, triggered manually after a completed search.
//!
//! The controller reads a snapshot of the session context at trigger time
//! and never writes it back. Its request lifecycle is single-flight and
//! independent from the session's; failures leave it retryable forever,
//! with retry driven by the user (no backoff, no automatic retry).

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::backend::{AiBackend, AiRequest, TransportError};
use crate::render::render;
use crate::session::SearchSession;
use crate::{AiAnswer, DEFAULT_QUESTION_TYPE, DEFAULT_SUBJECT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowupState {
    Ready,
    Requesting,
    Delivered,
    Retryable,
}

#[derive(Error, Debug)]
pub enum AskError {
    /// No completed search has cached recognized text yet.
    #[error("no recognized text to ask about")]
    NoContext,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("AI answer failed: {0}")]
    BackendReportedFailure(String),
}

/// A delivered answer, already rendered for display.
#[derive(Debug, Clone)]
pub struct DeliveredAnswer {
    pub answer: AiAnswer,
    pub rendered: String,
    /// The subject hint that was sent.
    pub subject: String,
    /// The question-type hint that was sent.
    pub question_type: String,
}

#[derive(Debug)]
pub enum AskOutcome {
    /// An ask was already in flight; this call was a no-op.
    AlreadyRequesting,
    Delivered(DeliveredAnswer),
}

pub struct AiFollowupController {
    backend: Arc<dyn AiBackend>,
    session: Arc<SearchSession>,
    state: Mutex<FollowupState>,
}

impl AiFollowupController {
    pub fn new(backend: Arc<dyn AiBackend>, session: Arc<SearchSession>) -> Self {
        Self {
            backend,
            session,
            state: Mutex::new(FollowupState::Ready),
        }
    }

    pub fn state(&self) -> FollowupState {
        *self.state.lock().unwrap()
    }

    /// Ask the AI backend about the last recognized text.
    ///
    /// Fails with [`AskError::NoContext`] before any network call when no
    /// search has cached recognized text. A `Delivered` controller can be
    /// re-asked, starting a new request cycle.
    pub async fn ask(&self) -> Result<AskOutcome, AskError> {
        let request = {
            let mut state = self.state.lock().unwrap();
            if *state == FollowupState::Requesting {
                tracing::debug!("ask ignored, request already in flight");
                return Ok(AskOutcome::AlreadyRequesting);
            }

            let snapshot = self.session.context_snapshot();
            let text = snapshot.recognized_text.ok_or(AskError::NoContext)?;
            let subject = snapshot
                .knowledge_tags
                .first()
                .map(|tag| tag.name.clone())
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
            let question_type = snapshot
                .question_type
                .unwrap_or_else(|| DEFAULT_QUESTION_TYPE.to_string());

            *state = FollowupState::Requesting;
            AiRequest {
                text,
                subject,
                question_type,
            }
        };

        tracing::info!(
            backend = self.backend.name(),
            subject = %request.subject,
            question_type = %request.question_type,
            "requesting AI answer"
        );

        let response = match self.backend.ask(&request).await {
            Ok(response) => response,
            Err(e) => {
                *self.state.lock().unwrap() = FollowupState::Retryable;
                return Err(e.into());
            }
        };

        if !response.success {
            *self.state.lock().unwrap() = FollowupState::Retryable;
            let message = response.error.unwrap_or_else(|| "AI answer failed".to_string());
            return Err(AskError::BackendReportedFailure(message));
        }

        let answer = match response.ai_answer {
            Some(answer) => answer,
            None => {
                *self.state.lock().unwrap() = FollowupState::Retryable;
                return Err(AskError::BackendReportedFailure(
                    "empty AI answer payload".to_string(),
                ));
            }
        };

        let rendered = render(&answer.answer);
        *self.state.lock().unwrap() = FollowupState::Delivered;
        Ok(AskOutcome::Delivered(DeliveredAnswer {
            answer,
            rendered,
            subject: request.subject,
            question_type: request.question_type,
        }))
    }
}
