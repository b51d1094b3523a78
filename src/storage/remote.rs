//! HTTP note-storage backend.
//!
//! Wire protocol (JSON, bearer auth after login):
//! - `POST /v1/session` `{username, password}` → `{token}`
//! - `GET  /v1/session` validates an existing token
//! - `POST /v1/sync` `{changes: [node...]}` pushes locally created items;
//!   `401` means the session is gone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::traits::{BackendError, ItemRef, ListItem, Node, NoteBackend};
use crate::config::StorageConfig;

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    changes: &'a [Node],
}

pub struct RemoteBackend {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
    /// Created locally, not yet accepted by a sync.
    pending: Vec<Node>,
}

impl RemoteBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            token: None,
            pending: Vec::new(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> anyhow::Result<Self> {
        let Some(base_url) = config.base_url.as_deref() else {
            anyhow::bail!("NOTES_BASE_URL is not set");
        };
        Ok(Self::new(base_url, Duration::from_secs(config.timeout_secs)))
    }

    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn rejection(resp: reqwest::Response) -> BackendError {
        let status = resp.status();
        let message = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            BackendError::Unauthorized(format!("{status}: {message}"))
        } else {
            BackendError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

#[async_trait]
impl NoteBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn authenticate(&mut self, username: &str, secret: &str) -> Result<String, BackendError> {
        let resp = self
            .client
            .post(self.url("/v1/session"))
            .json(&LoginRequest {
                username,
                password: secret,
            })
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }

        let body: LoginResponse = resp.json().await.map_err(transport)?;
        self.token = Some(body.token.clone());
        Ok(body.token)
    }

    async fn resume(&mut self, token: &str) -> Result<(), BackendError> {
        let resp = self
            .client
            .get(self.url("/v1/session"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }

        self.token = Some(token.to_string());
        Ok(())
    }

    async fn sync(&mut self) -> Result<(), BackendError> {
        let Some(token) = self.token.as_deref() else {
            return Err(BackendError::SessionExpired);
        };

        let resp = self
            .client
            .post(self.url("/v1/sync"))
            .bearer_auth(token)
            .json(&SyncRequest {
                changes: &self.pending,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(pending = self.pending_len(), "Remote: sync request failed");
                transport(e)
            })?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.token = None;
            return Err(BackendError::SessionExpired);
        }
        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }

        if self.pending_len() > 0 {
            tracing::debug!(count = self.pending_len(), "Remote: pushed pending items");
        }
        self.pending.clear();
        Ok(())
    }

    async fn create_note(&mut self, title: &str, body: &str) -> Result<ItemRef, BackendError> {
        let node = Node::note(title, body);
        let item = node.item_ref();
        self.pending.push(node);
        Ok(item)
    }

    async fn create_list(&mut self, title: &str, items: &[ListItem]) -> Result<ItemRef, BackendError> {
        let node = Node::list(title, items);
        let item = node.item_ref();
        self.pending.push(node);
        Ok(item)
    }
}
