use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::UserId;
use crate::models::enums::{PlantFlag, Sunlight};
use crate::models::patch::Patch;
use crate::models::plant::{
    FertilizerConfig, GrowthLog, HumidityConfig, Location, PestInfection, Plant, PlantPatch,
    SeasonalAdjustments, SoilConfig, WateringConfig,
};
use crate::plants::care::CareKind;
use crate::store::{PgStore, PlantStore, StoreError, StoreResult};

const SLUG_CONSTRAINT: &str = "plants_user_slug_key";

#[derive(Debug, FromRow)]
struct PlantRow {
    id: Uuid,
    user_id: String,
    slug: String,
    name: String,
    species: Option<String>,
    is_toxic: bool,
    sunlight: Option<String>,
    prefered_temperature: Option<f64>,
    location: Option<Json<Location>>,
    watering: Option<Json<WateringConfig>>,
    fertilizing: Option<Json<FertilizerConfig>>,
    humidity: Option<Json<HumidityConfig>>,
    soil: Option<Json<SoilConfig>>,
    seasonality: Option<Json<SeasonalAdjustments>>,
    pest_history: Option<Json<Vec<PestInfection>>>,
    flags: Option<Json<Vec<PlantFlag>>>,
    notes: Option<Json<Vec<String>>>,
    photo_ids: Option<Vec<String>>,
    growth_history: Option<Json<Vec<GrowthLog>>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlantRow> for Plant {
    fn from(row: PlantRow) -> Self {
        Plant {
            id: row.id,
            user_id: row.user_id,
            slug: row.slug,
            name: row.name,
            species: row.species,
            is_toxic: row.is_toxic,
            sunlight: row.sunlight.map(Sunlight::from),
            prefered_temperature: row.prefered_temperature,
            location: row.location.map(|j| j.0),
            watering: row.watering.map(|j| j.0),
            fertilizing: row.fertilizing.map(|j| j.0),
            humidity: row.humidity.map(|j| j.0),
            soil: row.soil.map(|j| j.0),
            seasonality: row.seasonality.map(|j| j.0),
            pest_history: row.pest_history.map(|j| j.0).unwrap_or_default(),
            flags: row.flags.map(|j| j.0).unwrap_or_default(),
            notes: row.notes.map(|j| j.0).unwrap_or_default(),
            photo_ids: row.photo_ids.unwrap_or_default(),
            growth_history: row.growth_history.map(|j| j.0).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Empty collections are stored as NULL, same as a cleared field.
fn list_json<T: Serialize>(items: &[T]) -> Option<Json<&[T]>> {
    (!items.is_empty()).then_some(Json(items))
}

/// Row filter for each kind of care. `$1` is "now".
fn due_filter(kind: CareKind) -> &'static str {
    match kind {
        CareKind::Watering => {
            r#"
            watering IS NOT NULL
              AND COALESCE((watering->>'intervalDays')::int, 0) > 0
              AND (watering->>'lastWatered' IS NULL
                   OR (watering->>'lastWatered')::timestamptz
                      + make_interval(days => (watering->>'intervalDays')::int) <= $1)
            "#
        }
        CareKind::Fertilizing => {
            r#"
            fertilizing IS NOT NULL
              AND COALESCE((fertilizing->>'intervalDays')::int, 0) > 0
              AND (fertilizing->>'lastFertilized' IS NULL
                   OR (fertilizing->>'lastFertilized')::timestamptz
                      + make_interval(days => (fertilizing->>'intervalDays')::int) <= $1)
            "#
        }
        CareKind::Misting => {
            r#"
            humidity IS NOT NULL
              AND COALESCE((humidity->>'requiresMisting')::boolean, false)
              AND COALESCE((humidity->>'mistingIntervalDays')::int, 0) > 0
              AND (humidity->>'lastMisted' IS NULL
                   OR (humidity->>'lastMisted')::timestamptz
                      + make_interval(days => (humidity->>'mistingIntervalDays')::int) <= $1)
            "#
        }
        CareKind::Repotting => {
            r#"
            soil IS NOT NULL
              AND COALESCE((soil->>'repottingCycle')::int, 0) > 0
              AND (soil->>'lastRepotted' IS NULL
                   OR (soil->>'lastRepotted')::timestamptz
                      + make_interval(months => (soil->>'repottingCycle')::int) <= $1)
            "#
        }
    }
}

fn push_json<T>(qb: &mut QueryBuilder<'_, Postgres>, column: &str, patch: Patch<T>)
where
    T: Serialize + Send + Sync + 'static,
{
    match patch {
        Patch::Unset => {}
        Patch::Clear => {
            qb.push(format!(", {column} = NULL"));
        }
        Patch::Value(v) => {
            qb.push(format!(", {column} = "));
            qb.push_bind(Json(v));
        }
    }
}

fn push_text(qb: &mut QueryBuilder<'_, Postgres>, column: &str, patch: Patch<String>) {
    match patch {
        Patch::Unset => {}
        Patch::Clear => {
            qb.push(format!(", {column} = NULL"));
        }
        Patch::Value(v) => {
            qb.push(format!(", {column} = "));
            qb.push_bind(v);
        }
    }
}

/// Builds the single-statement UPDATE for a normalized patch.
fn build_update<'a>(
    user: &UserId,
    id: Uuid,
    patch: PlantPatch,
    now: DateTime<Utc>,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE plants SET updated_at = ");
    qb.push_bind(now);

    if let Patch::Value(name) = patch.name {
        qb.push(", name = ");
        qb.push_bind(name);
    }
    push_text(&mut qb, "species", patch.species);
    if let Some(is_toxic) = patch.is_toxic {
        qb.push(", is_toxic = ");
        qb.push_bind(is_toxic);
    }
    push_text(
        &mut qb,
        "sunlight",
        patch.sunlight.map(|s| s.as_str().to_string()),
    );
    match patch.prefered_temperature {
        Patch::Unset => {}
        Patch::Clear => {
            qb.push(", prefered_temperature = NULL");
        }
        Patch::Value(t) => {
            qb.push(", prefered_temperature = ");
            qb.push_bind(t);
        }
    }
    push_json(&mut qb, "location", patch.location);
    push_json(&mut qb, "watering", patch.watering);
    push_json(&mut qb, "fertilizing", patch.fertilizing);
    push_json(&mut qb, "humidity", patch.humidity);
    push_json(&mut qb, "soil", patch.soil);
    push_json(&mut qb, "seasonality", patch.seasonality);
    push_json(&mut qb, "pest_history", patch.pest_history);
    push_json(&mut qb, "flags", patch.flags);
    push_json(&mut qb, "notes", patch.notes);
    match patch.photo_ids {
        Patch::Unset => {}
        Patch::Clear => {
            qb.push(", photo_ids = NULL");
        }
        Patch::Value(ids) => {
            qb.push(", photo_ids = ");
            qb.push_bind(ids);
        }
    }
    push_json(&mut qb, "growth_history", patch.growth_history);

    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb.push(" AND user_id = ");
    qb.push_bind(user.as_str().to_string());
    qb.push(" RETURNING *");
    qb
}

#[async_trait]
impl PlantStore for PgStore {
    async fn insert(&self, plant: &Plant, max_per_user: usize) -> StoreResult<()> {
        let max_per_user = i64::try_from(max_per_user).unwrap_or(i64::MAX);
        let mut tx = self.pool.begin().await?;

        // Serializes creates per owner so the count below cannot go stale
        // before the insert commits.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&plant.user_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO plants
                (id, user_id, slug, name, species, is_toxic, sunlight, prefered_temperature,
                 location, watering, fertilizing, humidity, soil, seasonality,
                 pest_history, flags, notes, photo_ids, growth_history, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                   $15, $16, $17, $18, $19, $20, $21
            WHERE (SELECT COUNT(*) FROM plants WHERE user_id = $2) < $22
            "#,
        )
        .bind(plant.id)
        .bind(&plant.user_id)
        .bind(&plant.slug)
        .bind(&plant.name)
        .bind(&plant.species)
        .bind(plant.is_toxic)
        .bind(plant.sunlight.as_ref().map(|s| s.as_str().to_string()))
        .bind(plant.prefered_temperature)
        .bind(plant.location.as_ref().map(Json))
        .bind(plant.watering.as_ref().map(Json))
        .bind(plant.fertilizing.as_ref().map(Json))
        .bind(plant.humidity.as_ref().map(Json))
        .bind(plant.soil.as_ref().map(Json))
        .bind(plant.seasonality.as_ref().map(Json))
        .bind(list_json(&plant.pest_history))
        .bind(list_json(&plant.flags))
        .bind(list_json(&plant.notes))
        .bind((!plant.photo_ids.is_empty()).then(|| plant.photo_ids.clone()))
        .bind(list_json(&plant.growth_history))
        .bind(plant.created_at)
        .bind(plant.updated_at)
        .bind(max_per_user)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::QuotaReached),
            Ok(_) => {
                tx.commit().await?;
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(SLUG_CONSTRAINT) => {
                Err(StoreError::SlugConflict(plant.slug.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, user: &UserId) -> StoreResult<Vec<Plant>> {
        let rows = sqlx::query_as::<_, PlantRow>(
            "SELECT * FROM plants WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Plant::from).collect())
    }

    async fn find_by_id(&self, user: &UserId, id: Uuid) -> StoreResult<Option<Plant>> {
        let row = sqlx::query_as::<_, PlantRow>(
            "SELECT * FROM plants WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Plant::from))
    }

    async fn find_by_slug(&self, user: &UserId, slug: &str) -> StoreResult<Option<Plant>> {
        let row = sqlx::query_as::<_, PlantRow>(
            "SELECT * FROM plants WHERE user_id = $1 AND slug = $2",
        )
        .bind(user.as_str())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Plant::from))
    }

    async fn slugs(&self, user: &UserId) -> StoreResult<HashSet<String>> {
        let slugs: Vec<String> = sqlx::query_scalar("SELECT slug FROM plants WHERE user_id = $1")
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(slugs.into_iter().collect())
    }

    async fn count_for_user(&self, user: &UserId) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plants WHERE user_id = $1")
            .bind(user.as_str())
            .fetch_one(&self.pool)
            .await?;
        usize::try_from(count).map_err(|_| StoreError::Corrupt(format!("negative count {count}")))
    }

    async fn update(
        &self,
        user: &UserId,
        id: Uuid,
        patch: PlantPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Plant>> {
        let mut qb = build_update(user, id, patch, now);
        let row = qb
            .build_query_as::<PlantRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Plant::from))
    }

    async fn delete(&self, user: &UserId, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM plants WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stamp_watered(
        &self,
        user: &UserId,
        ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let stamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let result = sqlx::query(
            r#"
            UPDATE plants
            SET watering = jsonb_set(watering, '{lastWatered}', to_jsonb($3::text)),
                updated_at = $4
            WHERE user_id = $1 AND id = ANY($2) AND watering IS NOT NULL
            "#,
        )
        .bind(user.as_str())
        .bind(ids)
        .bind(stamp)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn due_for_care(
        &self,
        kind: CareKind,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Plant>> {
        let sql = format!("SELECT * FROM plants WHERE {} LIMIT $2", due_filter(kind));
        let rows = sqlx::query_as::<_, PlantRow>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Plant::from).collect())
    }

    async fn owned_ids(&self, user: &UserId, ids: &[Uuid]) -> StoreResult<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let owned: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM plants WHERE user_id = $1 AND id = ANY($2)")
                .bind(user.as_str())
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(owned.into_iter().collect())
    }

    async fn referenced_photos(&self, user: &UserId) -> StoreResult<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT unnest(photo_ids) FROM plants WHERE user_id = $1
            UNION
            SELECT log->>'photoId'
            FROM plants, jsonb_array_elements(COALESCE(growth_history, '[]'::jsonb)) AS log
            WHERE user_id = $1 AND log->>'photoId' IS NOT NULL
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn count_owners(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM plants")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn estimate_count(&self) -> StoreResult<u64> {
        // reltuples is -1 (or 0) until the table has been analyzed.
        let estimate: Option<i64> = sqlx::query_scalar(
            "SELECT reltuples::bigint FROM pg_class WHERE oid = 'plants'::regclass",
        )
        .fetch_optional(&self.pool)
        .await?;

        match estimate {
            Some(n) if n > 0 => Ok(n as u64),
            _ => {
                let exact: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plants")
                    .fetch_one(&self.pool)
                    .await?;
                Ok(exact.max(0) as u64)
            }
        }
    }
}
