//! Rating entity - a buyer's review of a completed offer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::Snowflake;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

/// Rating entity, stored in the `reviews` table.
/// At most one per `(offer_id, reviewer_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Snowflake,
    pub offer_id: Snowflake,
    pub reviewer_id: Snowflake,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(
        id: Snowflake,
        offer_id: Snowflake,
        reviewer_id: Snowflake,
        rating: i16,
        comment: Option<String>,
    ) -> Result<Self, DomainError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(DomainError::InvalidRating(rating));
        }
        Ok(Self {
            id,
            offer_id,
            reviewer_id,
            rating,
            comment: comment.filter(|c| !c.trim().is_empty()),
            created_at: Utc::now(),
        })
    }
}
