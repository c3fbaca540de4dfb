//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` table of the initial migration.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database status ID back to the enum, if known.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Whether a lesson's therapist share has been paid out.
    LessonPayoutStatus {
        None = 1,
        Paid = 2,
    }
}

define_status_enum! {
    /// Payout request lifecycle status.
    PayoutStatus {
        Pending = 1,
        Paid = 2,
        Cancelled = 3,
    }
}

define_status_enum! {
    /// Pass (prepaid lesson bundle) lifecycle status.
    PassStatus {
        Active = 1,
        Cancelled = 2,
        Refunded = 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for status in [PayoutStatus::Pending, PayoutStatus::Paid, PayoutStatus::Cancelled] {
            assert_eq!(PayoutStatus::from_id(status.id()), Some(status));
        }
    }

    #[test]
    fn unknown_id_is_none() {
        assert_eq!(LessonPayoutStatus::from_id(0), None);
        assert_eq!(PassStatus::from_id(9), None);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&PayoutStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
