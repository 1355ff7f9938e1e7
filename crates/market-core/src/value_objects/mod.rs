//! Value objects - immutable types that represent domain concepts

mod phone;
mod snowflake;

pub use phone::PhoneNumber;
pub use snowflake::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
