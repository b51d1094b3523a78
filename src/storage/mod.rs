//! Note-storage session and backends.
//!
//! [`StorageSession`] owns the single authenticated connection to the
//! note store and serializes every write through it. Backends implement
//! [`NoteBackend`]:
//! - [`RemoteBackend`]: HTTP JSON service
//! - [`MemoryBackend`]: in-process, for local runs

pub mod memory;
pub mod remote;
pub mod session;
pub mod traits;

pub use memory::MemoryBackend;
pub use remote::RemoteBackend;
pub use session::{AuthError, StorageSession, StoreError};
pub use traits::{BackendError, ItemKind, ItemRef, ListItem, Node, NodeBody, NoteBackend};

use crate::config::{BackendKind, StorageConfig};

/// Build the configured backend.
pub fn create_backend(config: &StorageConfig) -> anyhow::Result<Box<dyn NoteBackend>> {
    match config.backend {
        BackendKind::Remote => Ok(Box::new(RemoteBackend::from_config(config)?)),
        BackendKind::Memory => {
            tracing::warn!("Using in-memory note storage; captures are lost on exit");
            Ok(Box::new(MemoryBackend::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_backend_picks_configured_kind() {
        let memory = StorageConfig {
            backend: BackendKind::Memory,
            ..StorageConfig::default()
        };
        assert_eq!(create_backend(&memory).unwrap().name(), "memory");

        let remote = StorageConfig {
            base_url: Some("http://127.0.0.1:9".into()),
            ..StorageConfig::default()
        };
        assert_eq!(create_backend(&remote).unwrap().name(), "remote");

        assert!(create_backend(&StorageConfig::default()).is_err());
    }
}
