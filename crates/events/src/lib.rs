//! Ledger event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope every subscriber receives.
//! - [`PayoutEvent`]: typed payout lifecycle notifications.

pub mod bus;
pub mod payout;

pub use bus::{EventBus, PlatformEvent};
pub use payout::{CancelReason, PayoutEvent};
