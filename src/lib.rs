pub mod auth;
pub mod config;
pub mod error;
pub mod imaging; // validation + scale-to-fit + JPEG data URIs
pub mod models;
pub mod openapi;
pub mod repo;
pub mod routes;
pub mod sanitize;
pub mod security;
pub mod storage;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use security::SecurityHeaders;

use std::sync::Arc;

/// Wires storage, repository and auth gate from a loaded config.
pub fn build_state(cfg: &config::AppConfig) -> AppState {
    let store = storage::FileStore::open(&cfg.data_dir, cfg.storage_quota);
    build_state_with_store(cfg, Arc::new(store))
}

pub fn build_state_with_store(cfg: &config::AppConfig, store: Arc<dyn storage::KeyValueStore>) -> AppState {
    let storage = storage::StorageManager::new(store);
    let repo = repo::local::LocalRepo::new(storage.clone(), cfg.media.clone());
    AppState {
        repo: Arc::new(repo),
        auth: auth::AuthGate::new(cfg.admin_token.as_str(), storage),
        media: Arc::new(cfg.media.clone()),
    }
}
