//! Notification delivery over Redis pub/sub

mod sink;

pub use sink::RedisNotificationSink;
