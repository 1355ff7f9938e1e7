//! PostgreSQL implementation of OfferRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use market_core::{
    Offer, OfferAcceptance, OfferRepository, OfferStatus, RepoResult, Snowflake,
};

use crate::mappers::{offer_status_counts, try_collect};
use crate::models::{OfferModel, StatusCountModel};

use super::error::map_db_error;

const OFFER_COLUMNS: &str =
    "id, request_id, supplier_id, price, message, contact_unlock_fee, status, created_at, completed_at";

/// PostgreSQL implementation of OfferRepository
#[derive(Clone)]
pub struct PgOfferRepository {
    pool: PgPool,
}

impl PgOfferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OfferRepository for PgOfferRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Offer>> {
        let row = sqlx::query_as::<_, OfferModel>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Offer::try_from).transpose()
    }

    #[instrument(skip(self, offer), fields(offer_id = %offer.id))]
    async fn create(&self, offer: &Offer) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO offers (id, request_id, supplier_id, price, message,
                                contact_unlock_fee, status, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(offer.id.into_inner())
        .bind(offer.request_id.into_inner())
        .bind(offer.supplier_id.into_inner())
        .bind(offer.price)
        .bind(&offer.message)
        .bind(offer.contact_unlock_fee)
        .bind(offer.status.as_str())
        .bind(offer.created_at)
        .bind(offer.completed_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_request(&self, request_id: Snowflake) -> RepoResult<Vec<Offer>> {
        let rows = sqlx::query_as::<_, OfferModel>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE request_id = $1 ORDER BY created_at, id"
        ))
        .bind(request_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        try_collect(rows)
    }

    #[instrument(skip(self))]
    async fn find_by_supplier(&self, supplier_id: Snowflake) -> RepoResult<Vec<Offer>> {
        let rows = sqlx::query_as::<_, OfferModel>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE supplier_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(supplier_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        try_collect(rows)
    }

    #[instrument(skip(self))]
    async fn accept(&self, offer_id: Snowflake, request_id: Snowflake) -> RepoResult<Option<OfferAcceptance>> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Row locks serialize concurrent acceptances on the same request
        let request_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM requests WHERE id = $1 FOR UPDATE")
                .bind(request_id.into_inner())
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?;

        if request_status.as_deref() != Some("pending") {
            debug!(?request_status, "Request no longer pending, acceptance lost");
            tx.rollback().await.map_err(map_db_error)?;
            return Ok(None);
        }

        let accepted = sqlx::query_as::<_, OfferModel>(&format!(
            "UPDATE offers SET status = 'accepted' \
             WHERE id = $1 AND request_id = $2 AND status = 'pending' \
             RETURNING {OFFER_COLUMNS}"
        ))
        .bind(offer_id.into_inner())
        .bind(request_id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let Some(accepted) = accepted else {
            debug!("Offer no longer pending, acceptance lost");
            tx.rollback().await.map_err(map_db_error)?;
            return Ok(None);
        };

        let rejected = sqlx::query_as::<_, OfferModel>(&format!(
            "UPDATE offers SET status = 'rejected' \
             WHERE request_id = $1 AND id <> $2 AND status = 'pending' \
             RETURNING {OFFER_COLUMNS}"
        ))
        .bind(request_id.into_inner())
        .bind(offer_id.into_inner())
        .fetch_all(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query(
            r#"
            UPDATE requests
            SET status = 'matched', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(request_id.into_inner())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(Some(OfferAcceptance {
            offer: Offer::try_from(accepted)?,
            rejected: try_collect(rejected)?,
        }))
    }

    #[instrument(skip(self))]
    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE offers
            SET status = 'expired'
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
    async fn count_by_status(&self, supplier_id: Snowflake) -> RepoResult<Vec<(OfferStatus, i64)>> {
        let rows = sqlx::query_as::<_, StatusCountModel>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM offers
            WHERE supplier_id = $1
            GROUP BY status
            "#,
        )
        .bind(supplier_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        offer_status_counts(rows)
    }
}
