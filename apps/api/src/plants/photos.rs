use serde::Serialize;
use tracing::warn;

use crate::auth::UserId;
use crate::models::plant::Plant;
use crate::object_store::ObjectStore;

/// A plant as returned to its owner, with short-lived photo links.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantView {
    #[serde(flatten)]
    pub plant: Plant,
    pub photo_urls: Vec<String>,
}

/// Presigned GET URLs for the photo ids inside the caller's namespace.
/// Foreign keys and inline data URIs get no URL; presign failures are skipped.
pub async fn resolve_photo_urls(
    objects: &dyn ObjectStore,
    user: &UserId,
    photo_ids: &[String],
) -> Vec<String> {
    let mut urls = Vec::with_capacity(photo_ids.len());
    for key in photo_ids.iter().filter(|k| user.owns_key(k)) {
        match objects.presign_get(key).await {
            Ok(url) => urls.push(url),
            Err(e) => warn!(%key, "failed to presign photo: {e}"),
        }
    }
    urls
}

pub async fn with_photo_urls(objects: &dyn ObjectStore, user: &UserId, plant: Plant) -> PlantView {
    let photo_urls = resolve_photo_urls(objects, user, &plant.photo_ids).await;
    PlantView { plant, photo_urls }
}
