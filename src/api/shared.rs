//! Shared state handed to every API handler

use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::gallery::{DirStorage, GalleryStore, KeyValueStorage};
use crate::media::UploadPolicy;
use crate::uploads::UploadStore;

/// State shared between handlers
pub struct SharedState {
    pub config: ServerConfig,
    pub uploads: UploadStore,
    pub gallery: GalleryStore,
    pub policy: UploadPolicy,
    pub started_at: Instant,
}

/// Handle used as axum router state
pub type SharedStateHandle = Arc<SharedState>;

impl SharedState {
    /// Build state with an explicit gallery storage backend
    pub fn with_storage(config: ServerConfig, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            uploads: UploadStore::from_config(&config),
            gallery: GalleryStore::load(storage),
            policy: UploadPolicy::new(config.max_upload_bytes),
            started_at: Instant::now(),
            config,
        }
    }

    /// Build state persisting the gallery under `config.state_dir`
    pub fn new(config: ServerConfig) -> Self {
        let storage = Arc::new(DirStorage::new(config.state_dir.clone()));
        Self::with_storage(config, storage)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Create the shared state handle for the server
pub fn create_shared_state(config: ServerConfig) -> SharedStateHandle {
    Arc::new(SharedState::new(config))
}
