//! PostgreSQL implementation of PaymentRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use market_core::{DomainError, Payment, PaymentRepository, RepoResult, Snowflake};

use crate::mappers::try_collect;
use crate::models::PaymentModel;

use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of PaymentRepository
#[derive(Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    #[instrument(skip(self, payment), fields(offer_id = %payment.offer_id))]
    async fn create(&self, payment: &Payment) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, offer_id, payer_id, reference, amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id.into_inner())
        .bind(payment.offer_id.into_inner())
        .bind(payment.payer_id.into_inner())
        .bind(&payment.reference)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || DomainError::PaymentAlreadyRecorded(payment.reference.clone()))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_offer(&self, offer_id: Snowflake) -> RepoResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentModel>(
            r#"
            SELECT id, offer_id, payer_id, reference, amount, status, created_at
            FROM payments
            WHERE offer_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(offer_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        try_collect(rows)
    }
}
