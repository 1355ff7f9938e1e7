//! Model to entity mappers
//!
//! Rows carry statuses as text, so conversion is fallible: an unknown status
//! string surfaces as a `DatabaseError` instead of being guessed at.

mod chat;
mod message;
mod offer;
mod payment;
mod rating;
mod request;

use market_core::{DomainError, RepoResult};

pub use offer::offer_status_counts;
pub use request::request_status_counts;

/// Convert every row, failing on the first bad one
pub fn try_collect<M, E>(rows: Vec<M>) -> RepoResult<Vec<E>>
where
    E: TryFrom<M, Error = DomainError>,
{
    rows.into_iter().map(E::try_from).collect()
}

pub(crate) fn corrupt(column: &str, value: &str) -> DomainError {
    DomainError::DatabaseError(format!("unexpected {column} value in row: {value}"))
}
