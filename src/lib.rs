//! Capture free-form chat messages as notes or checklists.
//!
//! A message from the owner is classified by an LLM into
//! `{title, NOTE|LIST, content}`, normalized, and written to the note
//! store, either immediately or after a confirm/discard click.

pub mod channels;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod gateway;
pub mod providers;
pub mod storage;

pub use classifier::{ClassificationError, ClassificationResult, TextClassifier};
pub use config::Config;
pub use coordinator::{CaptureCoordinator, CaptureRequest, ConfirmationGate, Outcome};
pub use storage::{StorageSession, StoreError};
