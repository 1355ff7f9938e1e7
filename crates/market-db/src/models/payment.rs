//! Payment database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct PaymentModel {
    pub id: i64,
    pub offer_id: i64,
    pub payer_id: i64,
    pub reference: String,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
