//! Rating database model (reviews table)

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RatingModel {
    pub id: i64,
    pub offer_id: i64,
    pub reviewer_id: i64,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
