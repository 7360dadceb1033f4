//! Enumeration types for the SignalGrid simulator.
//!
//! Both enums have a fixed textual form used by the store columns and the
//! JSON API. [`Density`] keeps its capitalized labels (`"Low"`), while
//! [`Phase`] is lowercase (`"green"`).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a stored or submitted label does not name a variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} label: {label}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The label that failed to parse.
    pub label: String,
}

// ---------------------------------------------------------------------------
// Density
// ---------------------------------------------------------------------------

/// Categorical demand label derived from a signal's vehicle count.
///
/// Each class maps one-to-one onto a green-time tier: `Low` = 25s,
/// `Medium` = 45s, `High` = 70s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Density {
    /// Fewer than 20 vehicles.
    Low,
    /// 20 to 40 vehicles inclusive.
    Medium,
    /// More than 40 vehicles.
    High,
}

impl Density {
    /// Canonical label as stored in the history log.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Dashboard color hint for this density class.
    pub const fn color(self) -> &'static str {
        match self {
            Self::Low => "green",
            Self::Medium => "amber",
            Self::High => "red",
        }
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Density {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            other => Err(ParseEnumError {
                kind: "density",
                label: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The light a signal is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Traffic may proceed.
    Green,
    /// Clearing interval before red.
    Yellow,
    /// Stopped; includes the all-red buffer at the end of a cycle.
    Red,
}

impl Phase {
    /// Canonical lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "red" => Ok(Self::Red),
            other => Err(ParseEnumError {
                kind: "phase",
                label: other.to_owned(),
            }),
        }
    }
}
