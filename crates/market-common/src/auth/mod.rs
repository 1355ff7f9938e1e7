//! Bearer token verification

mod jwt;

pub use jwt::{Claims, JwtVerifier};
