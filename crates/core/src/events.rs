//! Domain event names published on the event bus.

pub const EVENT_PAYOUT_REQUESTED: &str = "payout.requested";
pub const EVENT_PAYOUT_CONFIRMED: &str = "payout.confirmed";
pub const EVENT_PAYOUT_CANCELLED: &str = "payout.cancelled";

/// Source tag for events emitted by the ledger.
pub const EVENT_SOURCE_LEDGER: &str = "ledger";
