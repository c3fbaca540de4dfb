//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts

pub mod audit;
pub mod checkpoint;
pub mod commission;
pub mod lesson;
pub mod org;
pub mod pass;
pub mod payout_request;
pub mod transaction;
