//! Upload lifecycle: presign, register, delete, and the orphan sweep.
//!
//! Objects live under `users/<id>/`; a key outside the caller's prefix is
//! rejected before any store or object-store call is made.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::UserId;
use crate::config::Limits;
use crate::errors::{ensure_valid, AppError};
use crate::models::upload::{Upload, UploadStatus};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::store::{PlantStore, UploadStore};
use crate::validation::FieldError;

const SWEEP_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PresignRequest {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub key: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUsage {
    pub total_bytes: i64,
    pub object_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub deleted: usize,
    pub referenced: usize,
    pub failed: usize,
    /// The run stopped early because its time budget ran out.
    pub out_of_time: bool,
}

#[derive(Clone)]
pub struct UploadManager {
    uploads: Arc<dyn UploadStore>,
    plants: Arc<dyn PlantStore>,
    objects: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    limits: Limits,
}

impl UploadManager {
    pub fn new(
        uploads: Arc<dyn UploadStore>,
        plants: Arc<dyn PlantStore>,
        objects: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        limits: Limits,
    ) -> Self {
        Self {
            uploads,
            plants,
            objects,
            clock,
            limits,
        }
    }

    pub async fn issue_presigned_upload(
        &self,
        user: &UserId,
        request: PresignRequest,
    ) -> Result<PresignedUpload, AppError> {
        if request.filename.trim().is_empty()
            || request.content_type.trim().is_empty()
            || request.size_bytes <= 0
        {
            return Err(AppError::BadRequest(
                "filename, contentType and sizeBytes are required".to_string(),
            ));
        }
        ensure_valid(self.check_object(&request.content_type, request.size_bytes))?;

        let current = self.uploads.count_registered(user).await?;
        if current >= self.limits.max_uploads_per_user {
            return Err(AppError::QuotaExceeded {
                resource: "uploads",
                limit: self.limits.max_uploads_per_user,
                current,
            });
        }

        let key = object_key(user, &request.filename);
        let content_type = request.content_type.trim();
        let presigned = self.objects.presign_put(&key, content_type, user).await?;

        self.uploads
            .upsert(&Upload {
                user_id: user.to_string(),
                key: key.clone(),
                size_bytes: request.size_bytes,
                status: UploadStatus::Pending,
                created_at: self.clock.utc(),
                registered_at: None,
            })
            .await?;

        info!(user = %user, %key, "issued presigned upload");
        Ok(PresignedUpload {
            key,
            url: presigned.url,
            headers: presigned.headers,
        })
    }

    /// Verifies an uploaded object and records it against the user's quota.
    pub async fn register(&self, user: &UserId, key: &str) -> Result<Upload, AppError> {
        let key = key.trim();
        if key.is_empty() || !user.owns_key(key) {
            return Err(AppError::BadRequest("Invalid or unauthorized key".to_string()));
        }

        let meta = match self.objects.head(key).await {
            Ok(meta) => meta,
            Err(ObjectStoreError::NotFound(_)) => {
                return Err(AppError::BadRequest("Uploaded object not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        ensure_valid(self.check_object(
            meta.content_type.as_deref().unwrap_or_default(),
            meta.size,
        ))?;

        let now = self.clock.utc();
        let upload = Upload {
            user_id: user.to_string(),
            key: key.to_string(),
            size_bytes: meta.size,
            status: UploadStatus::Registered,
            created_at: now,
            registered_at: Some(now),
        };
        self.uploads.upsert(&upload).await?;

        info!(user = %user, %key, size = meta.size, "registered upload");
        Ok(upload)
    }

    /// Deletes the object, then its record. A failed object delete leaves the
    /// record in place so the sweep can retry.
    pub async fn delete_upload(&self, user: &UserId, key: &str) -> Result<(), AppError> {
        if key.is_empty() || !user.owns_key(key) {
            return Err(AppError::BadRequest("Invalid or unauthorized key".to_string()));
        }
        self.objects.delete(key).await?;
        self.uploads.delete(user, key).await?;
        info!(user = %user, %key, "deleted upload");
        Ok(())
    }

    pub async fn usage(&self, user: &UserId) -> Result<UploadUsage, AppError> {
        let objects = self.objects.list_prefix(&user.key_prefix()).await?;
        Ok(UploadUsage {
            total_bytes: objects.iter().map(|o| o.size).sum(),
            object_count: objects.len(),
        })
    }

    /// Removes uploads older than `older_than` that none of their owner's
    /// plants reference. Objects go first, in one batch per page; a record is
    /// dropped only once its object is gone. Failures on individual keys are
    /// logged and counted, and the run stops taking new keys once `budget`
    /// has elapsed.
    pub async fn cleanup_orphaned_uploads(
        &self,
        older_than: chrono::Duration,
        budget: Duration,
    ) -> Result<CleanupReport, AppError> {
        let deadline = tokio::time::Instant::now() + budget;
        let cutoff = self.clock.utc() - older_than;
        let mut report = CleanupReport::default();
        let mut references: HashMap<String, Option<HashSet<String>>> = HashMap::new();
        // Rows we keep shift the next page; deleted rows drop out of it.
        let mut offset = 0i64;

        loop {
            let page = self
                .uploads
                .created_before(cutoff, SWEEP_PAGE_SIZE, offset)
                .await?;
            if page.is_empty() {
                break;
            }

            let mut orphans: Vec<(UserId, String)> = Vec::new();
            for upload in page {
                if tokio::time::Instant::now() >= deadline {
                    report.out_of_time = true;
                    break;
                }
                report.scanned += 1;

                let Ok(owner) = UserId::parse(&upload.user_id) else {
                    warn!(key = %upload.key, "upload has an invalid owner, skipping");
                    report.failed += 1;
                    offset += 1;
                    continue;
                };

                if !references.contains_key(&upload.user_id) {
                    let refs = match self.plants.referenced_photos(&owner).await {
                        Ok(refs) => Some(refs),
                        Err(e) => {
                            warn!(user = %owner, "could not load photo references: {e}");
                            None
                        }
                    };
                    references.insert(upload.user_id.clone(), refs);
                }
                match references.get(&upload.user_id) {
                    Some(Some(refs)) if refs.contains(&upload.key) => {
                        report.referenced += 1;
                        offset += 1;
                    }
                    Some(Some(_)) => orphans.push((owner, upload.key)),
                    // Unknown references: never delete blind.
                    _ => {
                        report.failed += 1;
                        offset += 1;
                    }
                }
            }

            if !orphans.is_empty() {
                let keys: Vec<String> = orphans.iter().map(|(_, key)| key.clone()).collect();
                let undeleted: HashSet<String> = match self.objects.delete_batch(&keys).await {
                    Ok(failed) => failed.into_iter().collect(),
                    Err(e) => {
                        warn!(count = keys.len(), "batch delete of orphaned objects failed: {e}");
                        keys.into_iter().collect()
                    }
                };

                for (owner, key) in orphans {
                    if undeleted.contains(&key) {
                        warn!(%key, "failed to delete orphaned object");
                        report.failed += 1;
                        offset += 1;
                        continue;
                    }
                    match self.uploads.delete(&owner, &key).await {
                        Ok(_) => {
                            debug!(%key, "removed orphaned upload");
                            report.deleted += 1;
                        }
                        Err(e) => {
                            warn!(%key, "object deleted but record remains: {e}");
                            report.failed += 1;
                            offset += 1;
                        }
                    }
                }
            }

            if report.out_of_time {
                break;
            }
        }

        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            referenced = report.referenced,
            failed = report.failed,
            out_of_time = report.out_of_time,
            "orphaned upload sweep finished"
        );
        Ok(report)
    }

    fn check_object(&self, content_type: &str, size: i64) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if !self.limits.allows_content_type(content_type) {
            errors.push(FieldError::new(
                "contentType",
                format!(
                    "Unsupported content type; allowed: {}",
                    self.limits.allowed_content_types.join(", ")
                ),
            ));
        }
        if size > self.limits.max_upload_bytes {
            errors.push(FieldError::new(
                "sizeBytes",
                format!(
                    "File too large (max {} bytes)",
                    self.limits.max_upload_bytes
                ),
            ));
        }
        errors
    }
}

/// `users/<id>/<uuid>_<escaped filename>`
fn object_key(user: &UserId, filename: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(filename.trim().as_bytes()).collect();
    format!("{}{}_{}", user.key_prefix(), Uuid::new_v4(), escaped)
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::models::plant::{CreatePlantRequest, Plant};
    use crate::test_support::{
        fixed_now, user, FakeObjectStore, MemoryPlantStore, MemoryUploadStore, MutableClock,
    };

    struct Fixture {
        manager: UploadManager,
        uploads: Arc<MemoryUploadStore>,
        plants: Arc<MemoryPlantStore>,
        objects: Arc<FakeObjectStore>,
        clock: Arc<MutableClock>,
    }

    fn fixture() -> Fixture {
        let uploads = MemoryUploadStore::new();
        let plants = MemoryPlantStore::new();
        let objects = FakeObjectStore::new();
        let clock = Arc::new(MutableClock::new(fixed_now()));
        let manager = UploadManager::new(
            uploads.clone(),
            plants.clone(),
            objects.clone(),
            clock.clone(),
            Limits::default(),
        );
        Fixture {
            manager,
            uploads,
            plants,
            objects,
            clock,
        }
    }

    fn presign(filename: &str, content_type: &str, size: i64) -> PresignRequest {
        PresignRequest {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            size_bytes: size,
        }
    }

    fn upload(owner: &str, key: &str, status: UploadStatus, age: ChronoDuration) -> Upload {
        Upload {
            user_id: owner.to_string(),
            key: key.to_string(),
            size_bytes: 10,
            status,
            created_at: fixed_now() - age,
            registered_at: None,
        }
    }

    #[test]
    fn test_object_key_is_namespaced_and_escaped() {
        let key = object_key(&user("alice"), "my photo/1.jpg");
        assert!(key.starts_with("users/alice/"));
        assert!(key.ends_with("_my+photo%2F1.jpg"));
        assert_eq!(key.matches('/').count(), 2);
    }

    #[tokio::test]
    async fn test_presign_returns_signed_headers_and_records_pending() {
        let f = fixture();
        let alice = user("alice");
        let issued = f
            .manager
            .issue_presigned_upload(&alice, presign("leaf.jpg", "image/jpeg", 1024))
            .await
            .unwrap();

        assert!(alice.owns_key(&issued.key));
        assert_eq!(issued.headers["content-type"], "image/jpeg");
        assert_eq!(issued.headers["x-amz-acl"], "private");
        assert_eq!(issued.headers["x-amz-meta-user"], "alice");
        let record = f.uploads.get(&issued.key).unwrap();
        assert_eq!(record.status, UploadStatus::Pending);
    }

    #[tokio::test]
    async fn test_presign_rejects_bad_requests() {
        let f = fixture();
        let alice = user("alice");
        assert!(matches!(
            f.manager
                .issue_presigned_upload(&alice, presign("", "image/png", 10))
                .await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            f.manager
                .issue_presigned_upload(&alice, presign("a.png", "image/png", 0))
                .await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            f.manager
                .issue_presigned_upload(&alice, presign("a.svg", "image/svg+xml", 10))
                .await,
            Err(AppError::Validation(ref e)) if e[0].field == "contentType"
        ));
        assert!(matches!(
            f.manager
                .issue_presigned_upload(&alice, presign("a.png", "image/png", 2 * 1024 * 1024 + 1))
                .await,
            Err(AppError::Validation(ref e)) if e[0].field == "sizeBytes"
        ));
        assert!(f.objects.calls().is_empty());
    }

    #[tokio::test]
    async fn test_presign_enforces_registered_quota() {
        let f = fixture();
        let alice = user("alice");
        for i in 0..20 {
            f.uploads.seed(upload(
                "alice",
                &format!("users/alice/{i}_x.jpg"),
                UploadStatus::Registered,
                ChronoDuration::zero(),
            ));
        }
        let err = f
            .manager
            .issue_presigned_upload(&alice, presign("x.jpg", "image/jpeg", 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::QuotaExceeded {
                limit: 20,
                current: 20,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_foreign_key_before_any_io() {
        let f = fixture();
        let err = f
            .manager
            .register(&user("mallory"), "users/alice/1_a.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = f
            .manager
            .delete_upload(&user("mallory"), "users/alice/1_a.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(f.objects.calls().is_empty());
        assert_eq!(f.uploads.len(), 0);
    }

    #[tokio::test]
    async fn test_register_verifies_the_stored_object() {
        let f = fixture();
        let alice = user("alice");
        let missing = f.manager.register(&alice, "users/alice/1_gone.jpg").await;
        assert!(matches!(missing, Err(AppError::BadRequest(_))));

        f.objects.put("users/alice/2_big.jpg", 3 * 1024 * 1024, "image/jpeg");
        let too_big = f.manager.register(&alice, "users/alice/2_big.jpg").await;
        assert!(matches!(too_big, Err(AppError::Validation(_))));

        f.objects.put("users/alice/3_doc.pdf", 100, "application/pdf");
        let wrong_type = f.manager.register(&alice, "users/alice/3_doc.pdf").await;
        assert!(matches!(wrong_type, Err(AppError::Validation(_))));

        f.objects.put("users/alice/4_ok.png", 512, "image/png");
        let ok = f
            .manager
            .register(&alice, "users/alice/4_ok.png")
            .await
            .unwrap();
        assert_eq!(ok.size_bytes, 512);
        assert_eq!(ok.status, UploadStatus::Registered);
    }

    #[tokio::test]
    async fn test_late_registration_restarts_the_orphan_clock() {
        let f = fixture();
        let alice = user("alice");
        let hour = ChronoDuration::hours(1);
        let issued = f
            .manager
            .issue_presigned_upload(&alice, presign("a.webp", "image/webp", 100))
            .await
            .unwrap();
        f.objects.put(&issued.key, 90, "image/webp");
        f.clock.advance(ChronoDuration::minutes(59));
        f.manager.register(&alice, &issued.key).await.unwrap();

        let record = f.uploads.get(&issued.key).unwrap();
        assert_eq!(record.created_at, fixed_now());
        assert_eq!(record.registered_at, Some(fixed_now() + ChronoDuration::minutes(59)));
        assert_eq!(record.size_bytes, 90);

        f.clock.advance(ChronoDuration::minutes(2));
        let report = f
            .manager
            .cleanup_orphaned_uploads(hour, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(report.deleted, 0);
        assert!(f.uploads.get(&issued.key).is_some());
        assert!(f.objects.contains(&issued.key));

        f.clock.advance(ChronoDuration::minutes(59));
        let report = f
            .manager
            .cleanup_orphaned_uploads(hour, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(report.deleted, 1);
        assert!(!f.objects.contains(&issued.key));
    }

    #[tokio::test]
    async fn test_delete_removes_object_then_record() {
        let f = fixture();
        let alice = user("alice");
        let key = "users/alice/1_a.jpg";
        f.objects.put(key, 10, "image/jpeg");
        f.uploads
            .seed(upload("alice", key, UploadStatus::Registered, ChronoDuration::zero()));

        f.manager.delete_upload(&alice, key).await.unwrap();
        assert!(!f.objects.contains(key));
        assert!(f.uploads.get(key).is_none());
    }

    #[tokio::test]
    async fn test_failed_object_delete_keeps_record() {
        let f = fixture();
        let alice = user("alice");
        let key = "users/alice/1_a.jpg";
        f.objects.put(key, 10, "image/jpeg");
        f.objects.fail_delete_of(key);
        f.uploads
            .seed(upload("alice", key, UploadStatus::Registered, ChronoDuration::zero()));

        assert!(f.manager.delete_upload(&alice, key).await.is_err());
        assert!(f.uploads.get(key).is_some());
    }

    #[tokio::test]
    async fn test_usage_sums_own_prefix_only() {
        let f = fixture();
        f.objects.put("users/alice/1_a.jpg", 100, "image/jpeg");
        f.objects.put("users/alice/2_b.jpg", 50, "image/jpeg");
        f.objects.put("users/alicex/3_c.jpg", 999, "image/jpeg");
        let usage = f.manager.usage(&user("alice")).await.unwrap();
        assert_eq!(
            usage,
            UploadUsage {
                total_bytes: 150,
                object_count: 2
            }
        );
    }

    fn plant_with_photo(owner: &str, key: &str) -> Plant {
        Plant::from_request(
            CreatePlantRequest {
                name: "Fern".to_string(),
                photo_ids: vec![key.to_string()],
                ..Default::default()
            },
            owner,
            format!("fern-{}", Uuid::new_v4()),
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_unreferenced_uploads() {
        let f = fixture();
        let hour = ChronoDuration::hours(1);
        let old_orphan = "users/alice/1_orphan.jpg";
        let old_referenced = "users/alice/2_kept.jpg";
        let fresh = "users/alice/3_fresh.jpg";
        let never_uploaded = "users/bob/4_pending.jpg";
        for key in [old_orphan, old_referenced, fresh] {
            f.objects.put(key, 10, "image/jpeg");
        }
        f.uploads.seed(upload("alice", old_orphan, UploadStatus::Registered, hour * 2));
        f.uploads.seed(upload("alice", old_referenced, UploadStatus::Registered, hour * 2));
        f.uploads.seed(upload("alice", fresh, UploadStatus::Registered, ChronoDuration::minutes(10)));
        f.uploads.seed(upload("bob", never_uploaded, UploadStatus::Pending, hour * 3));
        f.plants.seed(plant_with_photo("alice", old_referenced));

        let report = f
            .manager
            .cleanup_orphaned_uploads(hour, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(report.referenced, 1);
        assert_eq!(report.failed, 0);
        assert!(!f.objects.contains(old_orphan));
        assert!(f.uploads.get(old_orphan).is_none());
        assert!(f.uploads.get(never_uploaded).is_none());
        assert!(f.objects.contains(old_referenced));
        assert!(f.uploads.get(fresh).is_some());
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failures() {
        let f = fixture();
        let old = ChronoDuration::hours(2);
        let stuck = "users/alice/1_stuck.jpg";
        let fine = "users/alice/2_fine.jpg";
        f.objects.put(stuck, 10, "image/jpeg");
        f.objects.put(fine, 10, "image/jpeg");
        f.objects.fail_delete_of(stuck);
        f.uploads.seed(upload("alice", stuck, UploadStatus::Registered, old));
        f.uploads
            .seed(upload("alice", fine, UploadStatus::Registered, old - ChronoDuration::minutes(1)));

        let report = f
            .manager
            .cleanup_orphaned_uploads(ChronoDuration::hours(1), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.deleted, 1);
        assert!(f.uploads.get(stuck).is_some());
        assert!(f.uploads.get(fine).is_none());
    }

    #[tokio::test]
    async fn test_sweep_never_deletes_when_references_unknown() {
        let f = fixture();
        let key = "users/alice/1_a.jpg";
        f.objects.put(key, 10, "image/jpeg");
        f.uploads
            .seed(upload("alice", key, UploadStatus::Registered, ChronoDuration::hours(2)));
        f.plants.fail_reads();

        let report = f
            .manager
            .cleanup_orphaned_uploads(ChronoDuration::hours(1), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.failed, 1);
        assert!(f.objects.contains(key));
    }

    #[tokio::test]
    async fn test_sweep_respects_budget() {
        let f = fixture();
        f.uploads.seed(upload(
            "alice",
            "users/alice/1_a.jpg",
            UploadStatus::Registered,
            ChronoDuration::hours(2),
        ));
        let report = f
            .manager
            .cleanup_orphaned_uploads(ChronoDuration::hours(1), Duration::ZERO)
            .await
            .unwrap();
        assert!(report.out_of_time);
        assert_eq!(report.scanned, 0);
        assert_eq!(f.uploads.len(), 1);
    }
}
