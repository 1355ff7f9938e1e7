//! Request database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for requests table
#[derive(Debug, Clone, FromRow)]
pub struct RequestModel {
    pub id: i64,
    pub buyer_id: i64,
    pub car_make: String,
    pub car_model: String,
    pub car_year: i32,
    pub part_needed: String,
    pub description: Option<String>,
    pub phone: String,
    pub location: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
