//! Part request entity - a buyer's solicitation for a specific part

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Lifecycle of a part request
///
/// ```text
/// pending_review -> pending | rejected
/// pending        -> matched | expired
/// matched        -> completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PendingReview,
    Pending,
    Matched,
    Completed,
    Rejected,
    Expired,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        Self::PendingReview,
        Self::Pending,
        Self::Matched,
        Self::Completed,
        Self::Rejected,
        Self::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Expired)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::PendingReview, Self::Pending | Self::Rejected)
                | (Self::Pending, Self::Matched | Self::Expired)
                | (Self::Matched, Self::Completed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("unknown request status: {s}")))
    }
}

fn compose_content(
    make: &str,
    model: &str,
    year: i32,
    part: &str,
    description: Option<&str>,
) -> String {
    let mut text = format!("{make} {model} {year} {part}");
    if let Some(description) = description {
        text.push(' ');
        text.push_str(description);
    }
    text
}

/// The buyer-supplied part of a request, as submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDraft {
    pub car_make: String,
    pub car_model: String,
    pub car_year: i32,
    pub part_needed: String,
    pub description: Option<String>,
    pub phone: String,
    pub location: String,
}

impl RequestDraft {
    /// Text fed to duplicate-content detection and AI review
    pub fn content(&self) -> String {
        compose_content(
            &self.car_make,
            &self.car_model,
            self.car_year,
            &self.part_needed,
            self.description.as_deref(),
        )
    }
}

/// Part request entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRequest {
    pub id: Snowflake,
    pub buyer_id: Snowflake,
    pub car_make: String,
    pub car_model: String,
    pub car_year: i32,
    pub part_needed: String,
    pub description: Option<String>,
    /// Digits-only
    pub phone: String,
    pub location: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartRequest {
    /// Create a new request from an admitted draft
    pub fn new(id: Snowflake, buyer_id: Snowflake, draft: RequestDraft, status: RequestStatus) -> Self {
        let now = Utc::now();
        Self {
            id,
            buyer_id,
            car_make: draft.car_make,
            car_model: draft.car_model,
            car_year: draft.car_year,
            part_needed: draft.part_needed,
            description: draft.description,
            phone: draft.phone,
            location: draft.location,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn is_owned_by(&self, user_id: Snowflake) -> bool {
        self.buyer_id == user_id
    }

    /// Only `pending` requests take offers
    #[inline]
    pub fn accepts_offers(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Apply a transition in memory, enforcing the state machine
    pub fn transition(&mut self, next: RequestStatus, action: &'static str) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_state(
                "request",
                self.id,
                self.status.as_str(),
                action,
            ));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn content(&self) -> String {
        compose_content(
            &self.car_make,
            &self.car_model,
            self.car_year,
            &self.part_needed,
            self.description.as_deref(),
        )
    }
}
