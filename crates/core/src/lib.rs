pub mod attribution;
pub mod audit;
pub mod commission;
pub mod error;
pub mod events;
pub mod hashing;
pub mod ledger;
pub mod money;
pub mod pass;
pub mod payout;
pub mod retention;
pub mod roles;
pub mod scope;
pub mod settlement;
pub mod status;
pub mod types;
