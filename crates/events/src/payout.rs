//! Typed payout lifecycle notifications.

use ledger_core::audit::entity_types;
use ledger_core::events::{EVENT_PAYOUT_CANCELLED, EVENT_PAYOUT_CONFIRMED, EVENT_PAYOUT_REQUESTED};
use ledger_core::types::{DbId, Money};
use serde::Serialize;

use crate::bus::PlatformEvent;

/// Why a request left PENDING without being paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Cancelled by a caller.
    Manual,
    /// Overtaken by newly settled lessons, or nothing left to pay.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayoutEvent {
    Requested {
        request_id: DbId,
        therapist_id: DbId,
        actor_id: DbId,
    },
    Confirmed {
        request_id: DbId,
        therapist_id: DbId,
        actor_id: DbId,
        transaction_id: DbId,
        net: Money,
        lesson_count: u32,
    },
    Cancelled {
        request_id: DbId,
        therapist_id: DbId,
        actor_id: Option<DbId>,
        reason: CancelReason,
    },
}

impl PayoutEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Requested { .. } => EVENT_PAYOUT_REQUESTED,
            Self::Confirmed { .. } => EVENT_PAYOUT_CONFIRMED,
            Self::Cancelled { .. } => EVENT_PAYOUT_CANCELLED,
        }
    }

    pub fn request_id(&self) -> DbId {
        match self {
            Self::Requested { request_id, .. }
            | Self::Confirmed { request_id, .. }
            | Self::Cancelled { request_id, .. } => *request_id,
        }
    }
}

impl From<PayoutEvent> for PlatformEvent {
    fn from(event: PayoutEvent) -> Self {
        let base = PlatformEvent::new(event.event_type())
            .with_source(entity_types::PAYOUT_REQUEST, event.request_id());

        match event {
            PayoutEvent::Requested {
                therapist_id,
                actor_id,
                ..
            } => base
                .with_actor(actor_id)
                .with_payload(serde_json::json!({ "therapist_id": therapist_id })),
            PayoutEvent::Confirmed {
                therapist_id,
                actor_id,
                transaction_id,
                net,
                lesson_count,
                ..
            } => base.with_actor(actor_id).with_payload(serde_json::json!({
                "therapist_id": therapist_id,
                "transaction_id": transaction_id,
                "net": net.to_string(),
                "lesson_count": lesson_count,
            })),
            PayoutEvent::Cancelled {
                therapist_id,
                actor_id,
                reason,
                ..
            } => {
                let event = base.with_payload(serde_json::json!({
                    "therapist_id": therapist_id,
                    "reason": reason,
                }));
                match actor_id {
                    Some(actor_id) => event.with_actor(actor_id),
                    None => event,
                }
            }
        }
    }
}
