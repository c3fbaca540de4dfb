//! Authentication primitives.
//!
//! - [`jwt`]: HS256 access-token validation (and issuance for tooling and
//!   tests; login lives outside this service).

pub mod jwt;
