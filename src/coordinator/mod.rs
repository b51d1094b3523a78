//! Capture coordination: authorization, classification, normalization and
//! either an immediate write or a staged confirm/discard.
//!
//! The coordinator never talks to the chat channel. It returns an
//! [`Outcome`] and the dispatcher turns that into reactions and messages.

pub mod gate;

use serde::Serialize;
use std::sync::Arc;

use crate::classifier::{CaptureKind, ClassificationResult, Content, TextClassifier};
use crate::config::CaptureMode;
use crate::storage::{ItemRef, StorageSession};

pub use gate::{ConfirmationGate, Decision, Resolution};

/// One inbound capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub raw_text: String,
    pub requester_id: String,
}

/// Normalized body: a list only ever carries items, a note only text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "UPPERCASE")]
pub enum CaptureBody {
    Note(String),
    List(Vec<String>),
}

/// A classification ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capture {
    pub title: String,
    #[serde(flatten)]
    pub body: CaptureBody,
}

impl Capture {
    pub fn kind(&self) -> CaptureKind {
        match self.body {
            CaptureBody::Note(_) => CaptureKind::Note,
            CaptureBody::List(_) => CaptureKind::List,
        }
    }
}

/// Reconcile `kind` with the shape of `content`.
///
/// `LIST` survives only with array content; everything else becomes a
/// note, with array items joined by newlines.
pub fn normalize(result: ClassificationResult) -> Capture {
    let body = match (result.kind, result.content) {
        (CaptureKind::List, Content::Items(items)) => CaptureBody::List(items),
        (_, Content::Items(items)) => CaptureBody::Note(items.join("\n")),
        (_, Content::Text(text)) => CaptureBody::Note(text),
    };
    Capture {
        title: result.title,
        body,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Unauthorized,
    EmptyText,
}

/// What happened to a capture or a confirm/discard click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored {
        title: String,
        kind: CaptureKind,
        item: ItemRef,
    },
    Staged {
        pending_id: String,
        capture: Capture,
    },
    ClassificationFailed {
        reason: String,
    },
    StoreFailed {
        title: String,
        reason: String,
        /// The item may have been saved anyway.
        uncertain: bool,
    },
    Discarded {
        title: String,
    },
    /// A confirm/discard arrived for a capture that was already resolved.
    AlreadyResolved,
    UnknownCapture,
    Ignored(IgnoreReason),
}

pub struct CaptureCoordinator {
    classifier: Arc<TextClassifier>,
    storage: Arc<StorageSession>,
    gate: ConfirmationGate,
    mode: CaptureMode,
    /// `None` denies everyone.
    owner: Option<String>,
}

impl CaptureCoordinator {
    pub fn new(
        classifier: Arc<TextClassifier>,
        storage: Arc<StorageSession>,
        mode: CaptureMode,
        owner: Option<String>,
    ) -> Self {
        Self {
            classifier,
            storage,
            gate: ConfirmationGate::new(),
            mode,
            owner,
        }
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    pub fn is_authorized(&self, requester_id: &str) -> bool {
        self.owner.as_deref() == Some(requester_id)
    }

    /// Cheap pre-check so the caller can acknowledge receipt before the
    /// slow path. `handle` repeats it.
    pub fn admit(&self, request: &CaptureRequest) -> Result<(), IgnoreReason> {
        if !self.is_authorized(&request.requester_id) {
            return Err(IgnoreReason::Unauthorized);
        }
        // Whitespace-only text has nothing to classify.
        if request.raw_text.trim().is_empty() {
            return Err(IgnoreReason::EmptyText);
        }
        Ok(())
    }

    pub async fn handle(&self, request: &CaptureRequest) -> Outcome {
        if let Err(reason) = self.admit(request) {
            if reason == IgnoreReason::Unauthorized {
                tracing::debug!(requester = %request.requester_id, "Ignoring capture from unauthorized user");
            }
            return Outcome::Ignored(reason);
        }

        let classification = match self.classifier.classify(&request.raw_text).await {
            Ok(c) => c,
            Err(e) => {
                return Outcome::ClassificationFailed {
                    reason: e.to_string(),
                }
            }
        };
        let capture = normalize(classification);

        match self.mode {
            CaptureMode::Direct => self.persist(&capture).await,
            CaptureMode::Confirm => {
                let pending_id = self.gate.stage(capture.clone());
                tracing::info!(
                    pending_id = %pending_id,
                    title = %capture.title,
                    open = self.gate.staged_count(),
                    "Capture staged for confirmation"
                );
                Outcome::Staged {
                    pending_id,
                    capture,
                }
            }
        }
    }

    /// Apply a confirm/discard click to a staged capture.
    pub async fn resolve(&self, pending_id: &str, decision: Decision, requester_id: &str) -> Outcome {
        if !self.is_authorized(requester_id) {
            return Outcome::Ignored(IgnoreReason::Unauthorized);
        }

        match self.gate.resolve(pending_id, decision) {
            Resolution::Confirmed(capture) => self.persist(&capture).await,
            Resolution::Discarded(capture) => {
                tracing::info!(pending_id = %pending_id, "Capture discarded");
                Outcome::Discarded {
                    title: capture.title,
                }
            }
            Resolution::AlreadyResolved(first) => {
                tracing::debug!(
                    pending_id = %pending_id,
                    first = first.as_str(),
                    "Ignoring click on resolved capture"
                );
                Outcome::AlreadyResolved
            }
            Resolution::Unknown => {
                tracing::warn!(pending_id = %pending_id, "Click for unknown capture");
                Outcome::UnknownCapture
            }
        }
    }

    async fn persist(&self, capture: &Capture) -> Outcome {
        let result = match &capture.body {
            CaptureBody::Note(text) => self.storage.create_note(&capture.title, text).await,
            CaptureBody::List(items) => self.storage.create_list(&capture.title, items).await,
        };

        match result {
            Ok(item) => {
                tracing::info!(
                    title = %capture.title,
                    kind = ?capture.kind(),
                    item_id = %item.id,
                    "Capture stored"
                );
                Outcome::Stored {
                    title: capture.title.clone(),
                    kind: capture.kind(),
                    item,
                }
            }
            Err(e) => {
                tracing::error!(title = %capture.title, "Storage operation failed: {e}");
                Outcome::StoreFailed {
                    title: capture.title.clone(),
                    uncertain: e.is_uncertain(),
                    reason: e.to_string(),
                }
            }
        }
    }
}
