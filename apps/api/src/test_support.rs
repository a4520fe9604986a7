//! In-memory stand-ins for the stores, object storage and clock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use uuid::Uuid;

use crate::auth::{JwtIdentityVerifier, UserId};
use crate::config::{Config, Limits};
use crate::models::notification::NotificationConfig;
use crate::models::plant::{Plant, PlantPatch};
use crate::models::upload::{Upload, UploadStatus};
use crate::object_store::{
    ObjectMeta, ObjectStore, ObjectStoreError, ObjectStoreResult, ObjectSummary, PresignedPut,
};
use crate::notifications::repository::NotificationRepository;
use crate::plants::care::{is_due, CareKind};
use crate::plants::repository::PlantRepository;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use crate::stats::StatsCache;
use crate::store::{NotificationStore, PlantStore, StoreError, StoreResult, UploadStore};
use crate::uploads::manager::UploadManager;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap()
}

// ────────────────────────────────────────────────────────────────────────────
// Clock
// ────────────────────────────────────────────────────────────────────────────

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        *lock(&self.0) += delta;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Plants
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryPlantStore {
    plants: Mutex<Vec<Plant>>,
    /// (user, slug) pairs another writer will grab right before our insert.
    racing_slugs: Mutex<HashSet<(String, String)>>,
    claimed_slugs: Mutex<HashSet<(String, String)>>,
    /// Plants a concurrent writer stores right before our next insert.
    racing_creates: Mutex<Vec<Plant>>,
    fail_reads: Mutex<bool>,
}

impl MemoryPlantStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, plant: Plant) {
        lock(&self.plants).push(plant);
    }

    pub fn all(&self) -> Vec<Plant> {
        lock(&self.plants).clone()
    }

    pub fn race_slug(&self, user: &UserId, slug: &str) {
        lock(&self.racing_slugs).insert((user.to_string(), slug.to_string()));
    }

    pub fn race_create(&self, plant: Plant) {
        lock(&self.racing_creates).push(plant);
    }

    pub fn fail_reads(&self) {
        *lock(&self.fail_reads) = true;
    }

    fn check_reads(&self) -> StoreResult<()> {
        if *lock(&self.fail_reads) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn owned_by(&self, user: &UserId) -> Vec<Plant> {
        lock(&self.plants)
            .iter()
            .filter(|p| p.user_id == user.as_str())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PlantStore for MemoryPlantStore {
    async fn insert(&self, plant: &Plant, max_per_user: usize) -> StoreResult<()> {
        let key = (plant.user_id.clone(), plant.slug.clone());
        if lock(&self.racing_slugs).remove(&key) {
            lock(&self.claimed_slugs).insert(key);
            return Err(StoreError::SlugConflict(plant.slug.clone()));
        }
        let mut plants = lock(&self.plants);
        plants.append(&mut lock(&self.racing_creates));
        if plants.iter().filter(|p| p.user_id == plant.user_id).count() >= max_per_user {
            return Err(StoreError::QuotaReached);
        }
        if plants
            .iter()
            .any(|p| p.user_id == plant.user_id && p.slug == plant.slug)
        {
            return Err(StoreError::SlugConflict(plant.slug.clone()));
        }
        plants.push(plant.clone());
        Ok(())
    }

    async fn list(&self, user: &UserId) -> StoreResult<Vec<Plant>> {
        self.check_reads()?;
        Ok(self.owned_by(user))
    }

    async fn find_by_id(&self, user: &UserId, id: Uuid) -> StoreResult<Option<Plant>> {
        self.check_reads()?;
        Ok(self.owned_by(user).into_iter().find(|p| p.id == id))
    }

    async fn find_by_slug(&self, user: &UserId, slug: &str) -> StoreResult<Option<Plant>> {
        self.check_reads()?;
        Ok(self.owned_by(user).into_iter().find(|p| p.slug == slug))
    }

    async fn slugs(&self, user: &UserId) -> StoreResult<HashSet<String>> {
        let mut slugs: HashSet<String> = self.owned_by(user).into_iter().map(|p| p.slug).collect();
        slugs.extend(
            lock(&self.claimed_slugs)
                .iter()
                .filter(|(owner, _)| owner == user.as_str())
                .map(|(_, slug)| slug.clone()),
        );
        Ok(slugs)
    }

    async fn count_for_user(&self, user: &UserId) -> StoreResult<usize> {
        Ok(self.owned_by(user).len())
    }

    async fn update(
        &self,
        user: &UserId,
        id: Uuid,
        patch: PlantPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Plant>> {
        let mut plants = lock(&self.plants);
        let Some(plant) = plants
            .iter_mut()
            .find(|p| p.id == id && p.user_id == user.as_str())
        else {
            return Ok(None);
        };
        plant.apply_patch(patch, now);
        Ok(Some(plant.clone()))
    }

    async fn delete(&self, user: &UserId, id: Uuid) -> StoreResult<bool> {
        let mut plants = lock(&self.plants);
        let before = plants.len();
        plants.retain(|p| !(p.id == id && p.user_id == user.as_str()));
        Ok(plants.len() < before)
    }

    async fn stamp_watered(
        &self,
        user: &UserId,
        ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut stamped = 0;
        for plant in lock(&self.plants).iter_mut() {
            if plant.user_id != user.as_str() || !ids.contains(&plant.id) {
                continue;
            }
            if let Some(watering) = plant.watering.as_mut() {
                watering.last_watered = Some(at);
                plant.updated_at = at;
                stamped += 1;
            }
        }
        Ok(stamped)
    }

    async fn due_for_care(
        &self,
        kind: CareKind,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Plant>> {
        Ok(lock(&self.plants)
            .iter()
            .filter(|p| is_due(kind, p, now))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn owned_ids(&self, user: &UserId, ids: &[Uuid]) -> StoreResult<HashSet<Uuid>> {
        Ok(self
            .owned_by(user)
            .into_iter()
            .map(|p| p.id)
            .filter(|id| ids.contains(id))
            .collect())
    }

    async fn referenced_photos(&self, user: &UserId) -> StoreResult<HashSet<String>> {
        self.check_reads()?;
        let mut refs = HashSet::new();
        for plant in self.owned_by(user) {
            refs.extend(plant.photo_ids);
            refs.extend(plant.growth_history.into_iter().filter_map(|g| g.photo_id));
        }
        Ok(refs)
    }

    async fn count_owners(&self) -> StoreResult<u64> {
        let owners: HashSet<String> = lock(&self.plants).iter().map(|p| p.user_id.clone()).collect();
        Ok(owners.len() as u64)
    }

    async fn estimate_count(&self) -> StoreResult<u64> {
        Ok(lock(&self.plants).len() as u64)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Uploads
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryUploadStore {
    uploads: Mutex<HashMap<String, Upload>>,
}

impl MemoryUploadStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, key: &str) -> Option<Upload> {
        lock(&self.uploads).get(key).cloned()
    }

    pub fn seed(&self, upload: Upload) {
        lock(&self.uploads).insert(upload.key.clone(), upload);
    }

    pub fn len(&self) -> usize {
        lock(&self.uploads).len()
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    async fn upsert(&self, upload: &Upload) -> StoreResult<()> {
        let mut uploads = lock(&self.uploads);
        match uploads.get_mut(&upload.key) {
            Some(existing) if existing.user_id == upload.user_id => {
                existing.size_bytes = upload.size_bytes;
                existing.status = upload.status;
                existing.registered_at = upload.registered_at;
            }
            Some(_) => {}
            None => {
                uploads.insert(upload.key.clone(), upload.clone());
            }
        }
        Ok(())
    }

    async fn count_registered(&self, user: &UserId) -> StoreResult<usize> {
        Ok(lock(&self.uploads)
            .values()
            .filter(|u| u.user_id == user.as_str() && u.status == UploadStatus::Registered)
            .count())
    }

    async fn delete(&self, user: &UserId, key: &str) -> StoreResult<bool> {
        let mut uploads = lock(&self.uploads);
        match uploads.get(key) {
            Some(u) if u.user_id == user.as_str() => {
                uploads.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Upload>> {
        let mut old: Vec<Upload> = lock(&self.uploads)
            .values()
            .filter(|u| u.aged_from() < cutoff)
            .cloned()
            .collect();
        old.sort_by(|a, b| (a.aged_from(), &a.key).cmp(&(b.aged_from(), &b.key)));
        Ok(old
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Notifications
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryNotificationStore {
    configs: Mutex<BTreeMap<String, NotificationConfig>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn find(&self, user: &UserId) -> StoreResult<Option<NotificationConfig>> {
        Ok(lock(&self.configs).get(user.as_str()).cloned())
    }

    async fn upsert(&self, config: &NotificationConfig) -> StoreResult<(NotificationConfig, bool)> {
        let mut configs = lock(&self.configs);
        let created = !configs.contains_key(&config.user_id);
        let mut stored = config.clone();
        if let Some(existing) = configs.get(&config.user_id) {
            stored.id = existing.id;
            stored.last_notification_sent_at = existing.last_notification_sent_at;
        } else if stored.id.is_none() {
            stored.id = Some(Uuid::new_v4());
        }
        configs.insert(config.user_id.clone(), stored.clone());
        Ok((stored, created))
    }

    async fn delete(&self, user: &UserId) -> StoreResult<bool> {
        Ok(lock(&self.configs).remove(user.as_str()).is_some())
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<NotificationConfig>> {
        Ok(lock(&self.configs)
            .values()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, user: &UserId, at: DateTime<Utc>) -> StoreResult<bool> {
        match lock(&self.configs).get_mut(user.as_str()) {
            Some(config) => {
                config.last_notification_sent_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_enabled(&self) -> StoreResult<u64> {
        Ok(lock(&self.configs)
            .values()
            .filter(|c| c.settings.is_enabled)
            .count() as u64)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Object storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<BTreeMap<String, ObjectMeta>>,
    failing_deletes: Mutex<HashSet<String>>,
    /// Every call, as "<op> <key>", in order.
    calls: Mutex<Vec<String>>,
}

impl FakeObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, key: &str, size: i64, content_type: &str) {
        lock(&self.objects).insert(
            key.to_string(),
            ObjectMeta {
                size,
                content_type: Some(content_type.to_string()),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    pub fn fail_delete_of(&self, key: &str) {
        lock(&self.failing_deletes).insert(key.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, op: &str, key: &str) {
        lock(&self.calls).push(format!("{op} {key}"));
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        owner: &UserId,
    ) -> ObjectStoreResult<PresignedPut> {
        self.record("presign_put", key);
        let headers = BTreeMap::from([
            ("content-type".to_string(), content_type.to_string()),
            ("x-amz-acl".to_string(), "private".to_string()),
            ("x-amz-meta-user".to_string(), owner.to_string()),
        ]);
        Ok(PresignedPut {
            url: format!("https://objects.test/{key}?X-Amz-Signature=put"),
            headers,
        })
    }

    async fn presign_get(&self, key: &str) -> ObjectStoreResult<String> {
        self.record("presign_get", key);
        Ok(format!("https://objects.test/{key}?X-Amz-Signature=get"))
    }

    async fn head(&self, key: &str) -> ObjectStoreResult<ObjectMeta> {
        self.record("head", key);
        lock(&self.objects)
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> ObjectStoreResult<()> {
        self.record("delete", key);
        if lock(&self.failing_deletes).contains(key) {
            return Err(ObjectStoreError::Request(format!("DELETE {key}: injected")));
        }
        lock(&self.objects).remove(key);
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> ObjectStoreResult<Vec<String>> {
        let mut failed = Vec::new();
        for key in keys {
            if self.delete(key).await.is_err() {
                failed.push(key.clone());
            }
        }
        Ok(failed)
    }

    async fn list_prefix(&self, prefix: &str) -> ObjectStoreResult<Vec<ObjectSummary>> {
        self.record("list", prefix);
        Ok(lock(&self.objects)
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, meta)| ObjectSummary {
                key: key.clone(),
                size: meta.size,
            })
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Application
// ────────────────────────────────────────────────────────────────────────────

pub const JWT_SECRET: &str = "plants-test-secret-at-least-32-bytes";

pub fn test_config() -> Config {
    let secs = std::time::Duration::from_secs;
    Config {
        database_url: "postgres://unused".to_string(),
        s3_bucket: "plants-test".to_string(),
        s3_endpoint: None,
        s3_region: "us-east-1".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_issuer: None,
        jwt_audience: None,
        port: 0,
        rust_log: "debug".to_string(),
        request_timeout: secs(30),
        presign_expiry: secs(3600),
        cleanup_interval: secs(1800),
        orphan_threshold: secs(3600),
        cleanup_budget: secs(300),
        stats_ttl: secs(300),
        cors_origins: Vec::new(),
        limits: Limits::default(),
    }
}

/// Handles on the in-memory backends behind a [`test_state`].
pub struct Backends {
    pub uploads: Arc<MemoryUploadStore>,
    pub objects: Arc<FakeObjectStore>,
}

pub fn test_state() -> (AppState, Backends) {
    let config = test_config();
    let clock = Arc::new(MutableClock::new(fixed_now()));
    let plant_store = MemoryPlantStore::new();
    let upload_store = MemoryUploadStore::new();
    let objects = FakeObjectStore::new();

    let plants = PlantRepository::new(
        plant_store.clone(),
        clock.clone(),
        config.limits.max_plants_per_user,
    );
    let notifications =
        NotificationRepository::new(MemoryNotificationStore::new(), plants.clone(), clock.clone());
    let uploads = UploadManager::new(
        upload_store.clone(),
        plant_store.clone(),
        objects.clone(),
        clock.clone(),
        config.limits.clone(),
    );
    let stats = Arc::new(StatsCache::new(
        plants.clone(),
        notifications.clone(),
        clock,
        config.stats_ttl,
    ));

    let state = AppState {
        identity: Arc::new(JwtIdentityVerifier::new(config.jwt_secret.as_bytes())),
        plants,
        uploads,
        notifications,
        stats,
        objects: objects.clone(),
        rate_limiter: Arc::new(RateLimiter::new()),
    };
    let backends = Backends {
        uploads: upload_store,
        objects,
    };
    (state, backends)
}

/// A bearer token for `sub`, valid for an hour of wall-clock time.
pub fn bearer(sub: &str) -> String {
    let claims = serde_json::json!({
        "sub": sub,
        "exp": Utc::now().timestamp() + 3600,
    });
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}
