//! # market-service
//!
//! Application layer: the request moderation gate and review queue, offer
//! matching, chat synchronization over the change feed, payments, ratings,
//! notifications, and the DTOs the HTTP layer speaks.

pub mod clients;
pub mod dto;
pub mod services;

pub use clients::{HttpAiReviewer, HttpPaymentVerifier};
pub use services::{ServiceContext, ServiceContextBuilder, ServiceError, ServiceResult, ServiceSettings};
