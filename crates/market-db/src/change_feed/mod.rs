//! Row-level change feeds

mod pg;

pub use pg::{feed_event, parse_payload, PgChangeFeed, CHANGE_CHANNEL};
