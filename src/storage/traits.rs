use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub text: String,
    pub checked: bool,
}

impl ListItem {
    pub fn unchecked(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            checked: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Note,
    List,
}

/// Opaque acknowledgement of a created item. Only used for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
    pub kind: ItemKind,
}

/// A note or checklist as it travels to the backend on sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub body: NodeBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeBody {
    Note { text: String },
    List { items: Vec<ListItem> },
}

impl Node {
    pub fn note(title: &str, text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            body: NodeBody::Note {
                text: text.to_string(),
            },
        }
    }

    pub fn list(title: &str, items: &[ListItem]) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            body: NodeBody::List {
                items: items.to_vec(),
            },
        }
    }

    pub fn item_ref(&self) -> ItemRef {
        ItemRef {
            id: self.id.clone(),
            kind: match self.body {
                NodeBody::Note { .. } => ItemKind::Note,
                NodeBody::List { .. } => ItemKind::List,
            },
        }
    }
}

/// Errors reported by a note-storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend no longer accepts the current session.
    #[error("session expired")]
    SessionExpired,
    /// Credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// A remote note store with sync-based persistence.
///
/// Items are created locally first and only become durable once a
/// subsequent [`sync`](NoteBackend::sync) succeeds.
#[async_trait]
pub trait NoteBackend: Send {
    fn name(&self) -> &str;

    /// Exchange a username and application password for a session token.
    async fn authenticate(&mut self, username: &str, secret: &str) -> Result<String, BackendError>;

    /// Re-use a previously minted session token.
    async fn resume(&mut self, token: &str) -> Result<(), BackendError>;

    /// Reconcile local and remote state, pushing pending local changes.
    async fn sync(&mut self) -> Result<(), BackendError>;

    async fn create_note(&mut self, title: &str, body: &str) -> Result<ItemRef, BackendError>;

    async fn create_list(&mut self, title: &str, items: &[ListItem]) -> Result<ItemRef, BackendError>;
}
