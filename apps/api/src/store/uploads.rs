use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::auth::UserId;
use crate::models::upload::{Upload, UploadStatus};
use crate::store::{PgStore, StoreError, StoreResult, UploadStore};

#[derive(Debug, FromRow)]
struct UploadRow {
    key: String,
    user_id: String,
    size_bytes: i64,
    status: String,
    created_at: DateTime<Utc>,
    registered_at: Option<DateTime<Utc>>,
}

impl TryFrom<UploadRow> for Upload {
    type Error = StoreError;

    fn try_from(row: UploadRow) -> Result<Self, Self::Error> {
        let status = UploadStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!("upload {} has status '{}'", row.key, row.status))
        })?;
        Ok(Upload {
            user_id: row.user_id,
            key: row.key,
            size_bytes: row.size_bytes,
            status,
            created_at: row.created_at,
            registered_at: row.registered_at,
        })
    }
}

#[async_trait]
impl UploadStore for PgStore {
    async fn upsert(&self, upload: &Upload) -> StoreResult<()> {
        // created_at is kept from the first write so the sweep ages uploads
        // from when they were presigned.
        sqlx::query(
            r#"
            INSERT INTO uploads (key, user_id, size_bytes, status, created_at, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key) DO UPDATE
            SET size_bytes = EXCLUDED.size_bytes,
                status = EXCLUDED.status,
                registered_at = EXCLUDED.registered_at
            WHERE uploads.user_id = EXCLUDED.user_id
            "#,
        )
        .bind(&upload.key)
        .bind(&upload.user_id)
        .bind(upload.size_bytes)
        .bind(upload.status.as_str())
        .bind(upload.created_at)
        .bind(upload.registered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_registered(&self, user: &UserId) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM uploads WHERE user_id = $1 AND status = 'registered'",
        )
        .bind(user.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as usize)
    }

    async fn delete(&self, user: &UserId, key: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM uploads WHERE key = $1 AND user_id = $2")
            .bind(key)
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Upload>> {
        let rows = sqlx::query_as::<_, UploadRow>(
            r#"
            SELECT * FROM uploads
            WHERE COALESCE(registered_at, created_at) < $1
            ORDER BY COALESCE(registered_at, created_at) ASC, key ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Upload::try_from).collect()
    }
}
