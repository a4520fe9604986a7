//! One notification config per user, with a computed default until the
//! user saves their own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::info;

use crate::auth::UserId;
use crate::errors::{ensure_valid, AppError};
use crate::models::notification::{NotificationConfig, NotificationSettings};
use crate::plants::repository::PlantRepository;
use crate::store::NotificationStore;
use crate::validation::notification::validate_notification_update;
use crate::validation::FieldError;

#[derive(Clone)]
pub struct NotificationRepository {
    store: Arc<dyn NotificationStore>,
    plants: PlantRepository,
    clock: Arc<dyn Clock>,
}

impl NotificationRepository {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        plants: PlantRepository,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            plants,
            clock,
        }
    }

    pub async fn get(&self, user: &UserId) -> Result<NotificationConfig, AppError> {
        Ok(match self.store.find(user).await? {
            Some(config) => config,
            None => NotificationConfig::default_for(user.as_str(), self.clock.utc()),
        })
    }

    /// Creates or fully replaces the user's config. Returns whether a new
    /// record was created.
    pub async fn upsert(
        &self,
        user: &UserId,
        settings: NotificationSettings,
    ) -> Result<(NotificationConfig, bool), AppError> {
        ensure_valid(validate_notification_update(&settings))?;

        if !settings.muted_plant_ids.is_empty() {
            let owned = self.plants.owned_ids(user, &settings.muted_plant_ids).await?;
            if settings.muted_plant_ids.iter().any(|id| !owned.contains(id)) {
                return Err(AppError::Validation(vec![FieldError::new(
                    "mutedPlantIds",
                    "One or more plant IDs do not belong to this user or do not exist",
                )]));
            }
        }

        let config = NotificationConfig {
            id: None,
            user_id: user.to_string(),
            settings,
            last_notification_sent_at: None,
            updated_at: self.clock.utc(),
        };
        let (stored, created) = self.store.upsert(&config).await?;
        info!(user = %user, created, "saved notification config");
        Ok((stored, created))
    }

    pub async fn delete(&self, user: &UserId) -> Result<bool, AppError> {
        Ok(self.store.delete(user).await?)
    }

    /// Stored configs in a stable order, for an external notifier to page
    /// through.
    pub async fn list_batch(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationConfig>, AppError> {
        Ok(self.store.list(limit, offset).await?)
    }

    pub async fn mark_sent(&self, user: &UserId, at: DateTime<Utc>) -> Result<bool, AppError> {
        Ok(self.store.mark_sent(user, at).await?)
    }

    pub async fn count_enabled(&self) -> Result<u64, AppError> {
        Ok(self.store.count_enabled().await?)
    }
}
