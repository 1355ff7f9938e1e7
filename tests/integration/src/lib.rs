//! Integration test utilities for the parts marketplace
//!
//! This crate provides helpers for running end-to-end tests against the
//! REST API, backed by the in-process store and scripted collaborators.

pub mod fakes;
pub mod fixtures;
pub mod helpers;

pub use fakes::*;
pub use fixtures::*;
pub use helpers::*;
