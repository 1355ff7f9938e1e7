//! PostgreSQL implementation of RequestRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use market_core::{PartRequest, RepoResult, RequestRepository, RequestStatus, Snowflake};

use crate::mappers::{request_status_counts, try_collect};
use crate::models::{RequestModel, StatusCountModel};

use super::error::map_db_error;

const REQUEST_COLUMNS: &str = "id, buyer_id, car_make, car_model, car_year, part_needed, \
     description, phone, location, status, created_at, updated_at";

/// PostgreSQL implementation of RequestRepository
#[derive(Clone)]
pub struct PgRequestRepository {
    pool: PgPool,
}

impl PgRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestRepository for PgRequestRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<PartRequest>> {
        let row = sqlx::query_as::<_, RequestModel>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(PartRequest::try_from).transpose()
    }

    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn create(&self, request: &PartRequest) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO requests (id, buyer_id, car_make, car_model, car_year, part_needed,
                                  description, phone, location, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id.into_inner())
        .bind(request.buyer_id.into_inner())
        .bind(&request.car_make)
        .bind(&request.car_model)
        .bind(request.car_year)
        .bind(&request.part_needed)
        .bind(&request.description)
        .bind(&request.phone)
        .bind(&request.location)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_buyer(&self, buyer_id: Snowflake) -> RepoResult<Vec<PartRequest>> {
        let rows = sqlx::query_as::<_, RequestModel>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE buyer_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(buyer_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        try_collect(rows)
    }

    #[instrument(skip(self))]
    async fn find_by_status(&self, status: RequestStatus, limit: i64) -> RepoResult<Vec<PartRequest>> {
        let rows = sqlx::query_as::<_, RequestModel>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE status = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(status.as_str())
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        try_collect(rows)
    }

    #[instrument(skip(self))]
    async fn compare_and_set_status(
        &self,
        id: Snowflake,
        from: RequestStatus,
        to: RequestStatus,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE requests
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.into_inner())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn complete(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let moved = sqlx::query(
            r#"
            UPDATE requests
            SET status = 'completed', updated_at = $2
            WHERE id = $1 AND status = 'matched'
            "#,
        )
        .bind(id.into_inner())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if moved.rows_affected() == 0 {
            tx.rollback().await.map_err(map_db_error)?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE offers
            SET completed_at = $2
            WHERE request_id = $1 AND status = 'accepted'
            "#,
        )
        .bind(id.into_inner())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE requests
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'pending' AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn count_by_status(&self, buyer_id: Snowflake) -> RepoResult<Vec<(RequestStatus, i64)>> {
        let rows = sqlx::query_as::<_, StatusCountModel>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM requests
            WHERE buyer_id = $1
            GROUP BY status
            "#,
        )
        .bind(buyer_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        request_status_counts(rows)
    }
}
