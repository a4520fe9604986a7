use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::UserId;
use crate::models::notification::{NotificationConfig, NotificationSettings, QuietHours};
use crate::store::{NotificationStore, PgStore, StoreResult};

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: String,
    is_enabled: bool,
    preferred_time: String,
    quiet_hours: Option<Json<QuietHours>>,
    batching_days: i32,
    group_by_type: bool,
    muted_plant_ids: Vec<String>,
    remind_watering: bool,
    remind_fertilize: bool,
    remind_repotting: bool,
    remind_misting: bool,
    last_notification_sent_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationConfig {
    fn from(row: NotificationRow) -> Self {
        NotificationConfig {
            id: Some(row.id),
            user_id: row.user_id,
            settings: NotificationSettings {
                is_enabled: row.is_enabled,
                preferred_time: row.preferred_time,
                quiet_hours: row.quiet_hours.map(|j| j.0),
                batching_days: row.batching_days,
                group_by_type: row.group_by_type,
                muted_plant_ids: row.muted_plant_ids,
                remind_watering: row.remind_watering,
                remind_fertilize: row.remind_fertilize,
                remind_repotting: row.remind_repotting,
                remind_misting: row.remind_misting,
            },
            last_notification_sent_at: row.last_notification_sent_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UpsertedRow {
    #[sqlx(flatten)]
    config: NotificationRow,
    inserted: bool,
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn find(&self, user: &UserId) -> StoreResult<Option<NotificationConfig>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notification_configs WHERE user_id = $1",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(NotificationConfig::from))
    }

    async fn upsert(&self, config: &NotificationConfig) -> StoreResult<(NotificationConfig, bool)> {
        let s = &config.settings;
        // xmax is zero only for a freshly inserted tuple.
        let row = sqlx::query_as::<_, UpsertedRow>(
            r#"
            INSERT INTO notification_configs
                (id, user_id, is_enabled, preferred_time, quiet_hours, batching_days,
                 group_by_type, muted_plant_ids, remind_watering, remind_fertilize,
                 remind_repotting, remind_misting, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (user_id) DO UPDATE
            SET is_enabled = EXCLUDED.is_enabled,
                preferred_time = EXCLUDED.preferred_time,
                quiet_hours = EXCLUDED.quiet_hours,
                batching_days = EXCLUDED.batching_days,
                group_by_type = EXCLUDED.group_by_type,
                muted_plant_ids = EXCLUDED.muted_plant_ids,
                remind_watering = EXCLUDED.remind_watering,
                remind_fertilize = EXCLUDED.remind_fertilize,
                remind_repotting = EXCLUDED.remind_repotting,
                remind_misting = EXCLUDED.remind_misting,
                updated_at = EXCLUDED.updated_at
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(config.id.unwrap_or_else(Uuid::new_v4))
        .bind(&config.user_id)
        .bind(s.is_enabled)
        .bind(&s.preferred_time)
        .bind(s.quiet_hours.as_ref().map(Json))
        .bind(s.batching_days)
        .bind(s.group_by_type)
        .bind(&s.muted_plant_ids)
        .bind(s.remind_watering)
        .bind(s.remind_fertilize)
        .bind(s.remind_repotting)
        .bind(s.remind_misting)
        .bind(config.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.config.into(), row.inserted))
    }

    async fn delete(&self, user: &UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notification_configs WHERE user_id = $1")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<NotificationConfig>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notification_configs ORDER BY user_id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NotificationConfig::from).collect())
    }

    async fn mark_sent(&self, user: &UserId, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE notification_configs SET last_notification_sent_at = $2 WHERE user_id = $1",
        )
        .bind(user.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_enabled(&self) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_configs WHERE is_enabled")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }
}
