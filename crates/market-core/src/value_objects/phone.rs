//! Phone number value object
//!
//! Buyers enter phone numbers in every imaginable format ("+1 (555) 010-2000",
//! "555.010.2000"). Comparisons against blocklists and velocity counters only
//! make sense on the digits, so the normalized form is digits-only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 15;

/// Digits-only phone number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize and validate a raw phone string
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let digits = Self::normalize(raw);
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(DomainError::InvalidPhone(raw.to_string()));
        }
        Ok(Self(digits))
    }

    /// Strip everything that is not an ASCII digit
    pub fn normalize(raw: &str) -> String {
        raw.chars().filter(char::is_ascii_digit).collect()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
