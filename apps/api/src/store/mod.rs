//! Document-store ports.
//!
//! Every plant and upload operation takes the owning user and filters on it
//! in the same statement that reads or mutates, so ownership cannot be
//! bypassed by passing someone else's id.

pub mod notifications;
pub mod plants;
pub mod uploads;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::UserId;
use crate::models::notification::NotificationConfig;
use crate::models::plant::{Plant, PlantPatch};
use crate::models::upload::Upload;
use crate::plants::care::CareKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("slug '{0}' is already taken")]
    SlugConflict(String),

    #[error("per-user limit reached")]
    QuotaReached,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PlantStore: Send + Sync {
    /// Inserts only while the owner has fewer than `max_per_user` plants,
    /// checked atomically with the insert ([`StoreError::QuotaReached`]).
    /// Fails with [`StoreError::SlugConflict`] if the slug is taken for this user.
    async fn insert(&self, plant: &Plant, max_per_user: usize) -> StoreResult<()>;
    async fn list(&self, user: &UserId) -> StoreResult<Vec<Plant>>;
    async fn find_by_id(&self, user: &UserId, id: Uuid) -> StoreResult<Option<Plant>>;
    async fn find_by_slug(&self, user: &UserId, slug: &str) -> StoreResult<Option<Plant>>;
    async fn slugs(&self, user: &UserId) -> StoreResult<HashSet<String>>;
    async fn count_for_user(&self, user: &UserId) -> StoreResult<usize>;
    /// Applies a normalized patch and returns the stored result, or `None`
    /// if the user has no such plant.
    async fn update(
        &self,
        user: &UserId,
        id: Uuid,
        patch: PlantPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Plant>>;
    async fn delete(&self, user: &UserId, id: Uuid) -> StoreResult<bool>;
    /// Stamps `watering.lastWatered` on the user's plants among `ids` that
    /// have a watering config. Returns how many were stamped.
    async fn stamp_watered(
        &self,
        user: &UserId,
        ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;
    async fn due_for_care(
        &self,
        kind: CareKind,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Plant>>;
    async fn owned_ids(&self, user: &UserId, ids: &[Uuid]) -> StoreResult<HashSet<Uuid>>;
    /// Every photo id the user's plants reference, gallery and growth log alike.
    async fn referenced_photos(&self, user: &UserId) -> StoreResult<HashSet<String>>;
    async fn count_owners(&self) -> StoreResult<u64>;
    /// May be approximate.
    async fn estimate_count(&self) -> StoreResult<u64>;
}

#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Inserts or replaces the record for `upload.key`.
    async fn upsert(&self, upload: &Upload) -> StoreResult<()>;
    async fn count_registered(&self, user: &UserId) -> StoreResult<usize>;
    async fn delete(&self, user: &UserId, key: &str) -> StoreResult<bool>;
    /// A page of uploads, across all users, whose age (from registration, or
    /// from presigning if never registered) started before `cutoff`. Oldest first.
    async fn created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Upload>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn find(&self, user: &UserId) -> StoreResult<Option<NotificationConfig>>;
    /// Creates or replaces the user's config. The bool is true when a new
    /// record was created.
    async fn upsert(&self, config: &NotificationConfig) -> StoreResult<(NotificationConfig, bool)>;
    async fn delete(&self, user: &UserId) -> StoreResult<bool>;
    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<NotificationConfig>>;
    async fn mark_sent(&self, user: &UserId, at: DateTime<Utc>) -> StoreResult<bool>;
    async fn count_enabled(&self) -> StoreResult<u64>;
}

/// Postgres implementation of every store port.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
