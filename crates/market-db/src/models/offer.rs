//! Offer database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for offers table
#[derive(Debug, Clone, FromRow)]
pub struct OfferModel {
    pub id: i64,
    pub request_id: i64,
    pub supplier_id: i64,
    pub price: i64,
    pub message: String,
    pub contact_unlock_fee: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// `SELECT status, COUNT(*) ... GROUP BY status`
#[derive(Debug, Clone, FromRow)]
pub struct StatusCountModel {
    pub status: String,
    pub count: i64,
}
