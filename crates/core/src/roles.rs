//! Well-known role name constants.
//!
//! These must match the values carried in the `role` claim and the
//! `users.role` column.

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_THERAPIST: &str = "therapist";
pub const ROLE_ACCOUNTANT: &str = "accountant";
