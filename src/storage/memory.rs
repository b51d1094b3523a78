//! In-process note store for local runs. Nothing leaves the machine.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use super::traits::{BackendError, ItemRef, ListItem, Node, NoteBackend};

#[derive(Default)]
struct MemoryState {
    token: Option<String>,
    pending: Vec<Node>,
    synced: Vec<Node>,
}

/// Memory-backed [`NoteBackend`]. Clones share the same store, so a
/// caller can keep one handle to inspect what was synced.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items that reached the "remote" side through a sync.
    pub fn synced(&self) -> Vec<Node> {
        self.state.lock().synced.clone()
    }

    /// Items created locally but not yet synced.
    pub fn pending(&self) -> Vec<Node> {
        self.state.lock().pending.clone()
    }
}

#[async_trait]
impl NoteBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn authenticate(&mut self, username: &str, secret: &str) -> Result<String, BackendError> {
        if username.is_empty() || secret.is_empty() {
            return Err(BackendError::Unauthorized("empty username or password".into()));
        }
        let token = format!("mem-{}", uuid::Uuid::new_v4());
        self.state.lock().token = Some(token.clone());
        Ok(token)
    }

    async fn resume(&mut self, token: &str) -> Result<(), BackendError> {
        if token.is_empty() {
            return Err(BackendError::Unauthorized("empty session token".into()));
        }
        self.state.lock().token = Some(token.to_string());
        Ok(())
    }

    async fn sync(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.token.is_none() {
            return Err(BackendError::SessionExpired);
        }
        let pending = std::mem::take(&mut state.pending);
        state.synced.extend(pending);
        Ok(())
    }

    async fn create_note(&mut self, title: &str, body: &str) -> Result<ItemRef, BackendError> {
        let node = Node::note(title, body);
        let item = node.item_ref();
        self.state.lock().pending.push(node);
        Ok(item)
    }

    async fn create_list(&mut self, title: &str, items: &[ListItem]) -> Result<ItemRef, BackendError> {
        let node = Node::list(title, items);
        let item = node.item_ref();
        self.state.lock().pending.push(node);
        Ok(item)
    }
}
