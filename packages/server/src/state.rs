use std::sync::Arc;

use common::upload::UploadEngine;

use crate::auth::{CredentialStore, TokenService};
use crate::config::AppConfig;
use crate::coordinator::UploadCoordinator;
use crate::indexer::Indexer;
use crate::tracks::TrackRepository;

/// Composition root, built once at startup and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub credentials: CredentialStore,
    pub tokens: TokenService,
    pub tracks: TrackRepository,
    pub uploads: Arc<dyn UploadEngine>,
    pub indexer: Indexer,
    pub coordinator: UploadCoordinator,
}
