//! Type-safe identifier wrappers around store-assigned integers.
//!
//! Signals and history rows are keyed by the row id the store hands out
//! at insert time (`BIGSERIAL` in `PostgreSQL`, a counter in memory).
//! Wrapping them prevents mixing a signal id with a history id at
//! compile time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around `i64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw store-assigned row id.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Return the inner integer value.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a traffic signal (one per intersection).
    SignalId
}

define_id! {
    /// Unique identifier for a history snapshot row.
    HistoryId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_serializes_as_bare_integer() {
        let id = SignalId::new(7);
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "7");
    }

    #[test]
    fn id_displays_inner_value() {
        assert_eq!(SignalId::new(42).to_string(), "42");
        assert_eq!(i64::from(HistoryId::new(3)), 3);
    }
}
