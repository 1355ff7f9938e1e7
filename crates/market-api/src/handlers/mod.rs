//! Route handlers
//!
//! All HTTP request handlers organized by domain.

pub mod admin;
pub mod chats;
pub mod health;
pub mod offers;
pub mod requests;
pub mod users;
