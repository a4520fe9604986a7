//! Public usage counters, cached for a short TTL.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use tracing::debug;

use crate::errors::AppError;
use crate::notifications::repository::NotificationRepository;
use crate::plants::repository::PlantRepository;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub users: u64,
    pub plants: u64,
    pub reminders: u64,
}

struct Cached {
    stats: Stats,
    computed_at: DateTime<Utc>,
}

pub struct StatsCache {
    plants: PlantRepository,
    notifications: NotificationRepository,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    cached: Mutex<Option<Cached>>,
}

impl StatsCache {
    pub fn new(
        plants: PlantRepository,
        notifications: NotificationRepository,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            plants,
            notifications,
            clock,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached counters, recomputing them once the TTL has passed.
    /// Concurrent misses may each recompute; the last write wins.
    pub async fn get(&self) -> Result<Stats, AppError> {
        let now = self.clock.utc();
        if let Some(stats) = self.fresh(now) {
            return Ok(stats);
        }

        let stats = Stats {
            users: self.plants.count_active_users().await?,
            plants: self.plants.count_plants().await?,
            reminders: self.notifications.count_enabled().await?,
        };
        debug!(?stats, "recomputed stats");
        *self.lock() = Some(Cached {
            stats,
            computed_at: now,
        });
        Ok(stats)
    }

    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    fn fresh(&self, now: DateTime<Utc>) -> Option<Stats> {
        self.lock()
            .as_ref()
            .filter(|c| now - c.computed_at < self.ttl)
            .map(|c| c.stats)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Cached>> {
        self.cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    Ok(Json(state.stats.get().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plant::CreatePlantRequest;
    use crate::test_support::{
        fixed_now, user, MemoryNotificationStore, MemoryPlantStore, MutableClock,
    };

    fn setup() -> (StatsCache, PlantRepository, Arc<MutableClock>) {
        let clock = Arc::new(MutableClock::new(fixed_now()));
        let plants = PlantRepository::new(MemoryPlantStore::new(), clock.clone(), 100);
        let notifications = NotificationRepository::new(
            MemoryNotificationStore::new(),
            plants.clone(),
            clock.clone(),
        );
        let cache = StatsCache::new(
            plants.clone(),
            notifications,
            clock.clone(),
            Duration::from_secs(300),
        );
        (cache, plants, clock)
    }

    async fn add_plant(plants: &PlantRepository, owner: &str) {
        plants
            .create(
                &user(owner),
                CreatePlantRequest {
                    name: "Calathea".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_serves_cached_value_within_ttl() {
        let (cache, plants, clock) = setup();
        add_plant(&plants, "alice").await;
        assert_eq!(cache.get().await.unwrap().plants, 1);

        add_plant(&plants, "bob").await;
        clock.advance(chrono::Duration::seconds(299));
        assert_eq!(cache.get().await.unwrap().plants, 1);

        clock.advance(chrono::Duration::seconds(1));
        let stats = cache.get().await.unwrap();
        assert_eq!(stats.plants, 2);
        assert_eq!(stats.users, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let (cache, plants, _) = setup();
        assert_eq!(cache.get().await.unwrap().plants, 0);
        add_plant(&plants, "alice").await;
        cache.invalidate();
        assert_eq!(
            cache.get().await.unwrap(),
            Stats {
                users: 1,
                plants: 1,
                reminders: 0
            }
        );
    }
}
