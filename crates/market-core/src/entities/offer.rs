//! Offer entity - a seller's priced response to a part request

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Offer lifecycle: `pending -> accepted | rejected | expired`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 4] = [Self::Pending, Self::Accepted, Self::Rejected, Self::Expired];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn can_transition_to(&self, next: OfferStatus) -> bool {
        *self == Self::Pending && next != Self::Pending
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("unknown offer status: {s}")))
    }
}

/// Offer entity
///
/// Prices and fees are integer minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Snowflake,
    pub request_id: Snowflake,
    pub supplier_id: Snowflake,
    pub price: i64,
    pub message: String,
    pub contact_unlock_fee: i64,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    /// Stamped when the owning request completes; gates rating
    pub completed_at: Option<DateTime<Utc>>,
}

impl Offer {
    pub fn new(
        id: Snowflake,
        request_id: Snowflake,
        supplier_id: Snowflake,
        price: i64,
        message: String,
        contact_unlock_fee: i64,
    ) -> Self {
        Self {
            id,
            request_id,
            supplier_id,
            price,
            message,
            contact_unlock_fee,
            status: OfferStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == OfferStatus::Pending
    }

    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.status == OfferStatus::Accepted
    }

    /// Accepted and the request has been completed
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.is_accepted() && self.completed_at.is_some()
    }
}
