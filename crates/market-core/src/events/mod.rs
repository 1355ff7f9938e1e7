//! Domain events and row-level change notifications

mod change;
mod domain_event;

pub use change::{ChangeFilter, ChangeOp, FeedEvent, RowChange, Table};
pub use domain_event::{DomainEvent, Notification};
