//! PostgreSQL implementation of RatingRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use market_core::{DomainError, Rating, RatingRepository, RepoResult, Snowflake};

use crate::mappers::try_collect;
use crate::models::RatingModel;

use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of RatingRepository (reviews table)
#[derive(Clone)]
pub struct PgRatingRepository {
    pool: PgPool,
}

impl PgRatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RatingRepository for PgRatingRepository {
    #[instrument(skip(self, rating), fields(offer_id = %rating.offer_id))]
    async fn create(&self, rating: &Rating) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, offer_id, reviewer_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(rating.id.into_inner())
        .bind(rating.offer_id.into_inner())
        .bind(rating.reviewer_id.into_inner())
        .bind(rating.rating)
        .bind(&rating.comment)
        .bind(rating.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || DomainError::RatingAlreadyExists {
                offer_id: rating.offer_id,
            })
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_offer(&self, offer_id: Snowflake) -> RepoResult<Vec<Rating>> {
        let rows = sqlx::query_as::<_, RatingModel>(
            r#"
            SELECT id, offer_id, reviewer_id, rating, comment, created_at
            FROM reviews
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
