//! Owner-scoped operations on the plant aggregate.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::UserId;
use crate::errors::{ensure_valid, AppError};
use crate::models::plant::{CreatePlantRequest, Plant, PlantPatch};
use crate::plants::care::CareKind;
use crate::plants::slug::unique_slug;
use crate::store::{PlantStore, StoreError};
use crate::validation::plant::{validate_create, validate_update};

/// How many times a create re-derives its slug after losing an insert race.
const MAX_SLUG_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct PlantRepository {
    store: Arc<dyn PlantStore>,
    clock: Arc<dyn Clock>,
    max_plants_per_user: usize,
}

impl PlantRepository {
    pub fn new(store: Arc<dyn PlantStore>, clock: Arc<dyn Clock>, max_plants_per_user: usize) -> Self {
        Self {
            store,
            clock,
            max_plants_per_user,
        }
    }

    pub async fn create(&self, user: &UserId, request: CreatePlantRequest) -> Result<Plant, AppError> {
        ensure_valid(validate_create(&request))?;

        let current = self.store.count_for_user(user).await?;
        if current >= self.max_plants_per_user {
            return Err(AppError::QuotaExceeded {
                resource: "plants",
                limit: self.max_plants_per_user,
                current,
            });
        }

        let now = self.clock.utc();
        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let taken = self.store.slugs(user).await?;
            let slug = unique_slug(&request.name, request.location.as_ref(), &taken);
            let plant = Plant::from_request(request.clone(), user.as_str(), slug, now);

            match self.store.insert(&plant, self.max_plants_per_user).await {
                Ok(()) => {
                    info!(user = %user, plant = %plant.id, slug = %plant.slug, "created plant");
                    return Ok(plant);
                }
                Err(StoreError::SlugConflict(slug)) => {
                    warn!(user = %user, %slug, attempt, "slug taken by a concurrent create, retrying");
                }
                // A concurrent create took the last slot after our count.
                Err(StoreError::QuotaReached) => {
                    return Err(AppError::QuotaExceeded {
                        resource: "plants",
                        limit: self.max_plants_per_user,
                        current: self.max_plants_per_user,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(
            "Could not allocate a unique slug, please retry".to_string(),
        ))
    }

    pub async fn get_all(&self, user: &UserId) -> Result<Vec<Plant>, AppError> {
        Ok(self.store.list(user).await?)
    }

    /// Unknown, foreign and malformed ids are all reported the same way.
    pub async fn get_by_id(&self, user: &UserId, id: &str) -> Result<Plant, AppError> {
        let id = parse_id(id)?;
        self.store
            .find_by_id(user, id)
            .await?
            .ok_or(AppError::NotFound("Plant"))
    }

    pub async fn get_by_slug(&self, user: &UserId, slug: &str) -> Result<Plant, AppError> {
        self.store
            .find_by_slug(user, slug)
            .await?
            .ok_or(AppError::NotFound("Plant"))
    }

    /// Partial update: absent fields are kept, `null` or blank values clear
    /// the stored field, anything else replaces it wholesale.
    pub async fn update(&self, user: &UserId, id: &str, patch: PlantPatch) -> Result<Plant, AppError> {
        let id = parse_id(id)?;
        let patch = patch.normalized();
        ensure_valid(validate_update(&patch))?;

        let plant = self
            .store
            .update(user, id, patch, self.clock.utc())
            .await?
            .ok_or(AppError::NotFound("Plant"))?;
        info!(user = %user, plant = %plant.id, "updated plant");
        Ok(plant)
    }

    pub async fn delete(&self, user: &UserId, id: &str) -> Result<bool, AppError> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(false);
        };
        let deleted = self.store.delete(user, id).await?;
        if deleted {
            info!(user = %user, plant = %id, "deleted plant");
        }
        Ok(deleted)
    }

    /// Marks the given plants as watered now. Ids that are malformed, belong
    /// to someone else, or have no watering schedule are skipped.
    pub async fn water_many(&self, user: &UserId, ids: &[String]) -> Result<u64, AppError> {
        let ids: Vec<Uuid> = ids
            .iter()
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect();
        let stamped = self
            .store
            .stamp_watered(user, &ids, self.clock.utc())
            .await?;
        info!(user = %user, requested = ids.len(), stamped, "watered plants");
        Ok(stamped)
    }

    pub async fn needing_care(
        &self,
        kind: CareKind,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Plant>, AppError> {
        Ok(self.store.due_for_care(kind, now, limit).await?)
    }

    pub async fn needing_watering(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Plant>, AppError> {
        self.needing_care(CareKind::Watering, now, limit).await
    }

    pub async fn needing_fertilizing(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Plant>, AppError> {
        self.needing_care(CareKind::Fertilizing, now, limit).await
    }

    pub async fn needing_misting(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Plant>, AppError> {
        self.needing_care(CareKind::Misting, now, limit).await
    }

    pub async fn needing_repotting(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Plant>, AppError> {
        self.needing_care(CareKind::Repotting, now, limit).await
    }

    pub async fn count_active_users(&self) -> Result<u64, AppError> {
        Ok(self.store.count_owners().await?)
    }

    pub async fn count_plants(&self) -> Result<u64, AppError> {
        Ok(self.store.estimate_count().await?)
    }

    /// The subset of `ids` naming plants the user owns.
    pub async fn owned_ids(&self, user: &UserId, ids: &[String]) -> Result<HashSet<String>, AppError> {
        let parsed: Vec<Uuid> = ids
            .iter()
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect();
        let owned = self.store.owned_ids(user, &parsed).await?;
        Ok(ids
            .iter()
            .filter(|id| Uuid::parse_str(id).is_ok_and(|u| owned.contains(&u)))
            .cloned()
            .collect())
    }
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::NotFound("Plant"))
}
