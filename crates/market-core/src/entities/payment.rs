//! Payment entity - a verified contact-unlock payment for an offer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Confirmed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
        }
    }
}

/// Payment entity. Only written after the verifier confirmed the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Snowflake,
    pub offer_id: Snowflake,
    pub payer_id: Snowflake,
    pub reference: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn confirmed(id: Snowflake, offer_id: Snowflake, payer_id: Snowflake, reference: String, amount: i64) -> Self {
        Self {
            id,
            offer_id,
            payer_id,
            reference,
            amount,
            status: PaymentStatus::Confirmed,
            created_at: Utc::now(),
        }
    }
}
