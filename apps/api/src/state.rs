use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::notifications::repository::NotificationRepository;
use crate::object_store::ObjectStore;
use crate::plants::repository::PlantRepository;
use crate::rate_limit::RateLimiter;
use crate::stats::StatsCache;
use crate::uploads::manager::UploadManager;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub plants: PlantRepository,
    pub uploads: UploadManager,
    pub notifications: NotificationRepository,
    pub stats: Arc<StatsCache>,
    /// Used directly only to sign photo download URLs.
    pub objects: Arc<dyn ObjectStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub rate_limiter: Arc<RateLimiter>,
}
