//! Waste and synchronization enums.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a stored enum value is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The offending value.
    pub value: String,
}

/// Why a product was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteReason {
    /// Past its sell-by date.
    Expired,
    /// Broken, burnt or otherwise unsellable.
    Damaged,
}

impl WasteReason {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Damaged => "damaged",
        }
    }

    /// Human-readable label for printed documents.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Expired => "Expired",
            Self::Damaged => "Damaged",
        }
    }
}

impl fmt::Display for WasteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WasteReason {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expired" => Ok(Self::Expired),
            "damaged" => Ok(Self::Damaged),
            other => Err(UnknownVariant {
                kind: "waste reason",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether a locally cached record has reached the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Unsynced,
    Synced,
}

impl SyncStatus {
    /// Returns `true` for [`SyncStatus::Synced`].
    #[must_use]
    pub const fn is_synced(self) -> bool {
        matches!(self, Self::Synced)
    }
}

impl From<bool> for SyncStatus {
    fn from(synced: bool) -> Self {
        if synced { Self::Synced } else { Self::Unsynced }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_waste_reason_roundtrips_through_str() {
        for reason in [WasteReason::Expired, WasteReason::Damaged] {
            assert_eq!(reason.as_str().parse::<WasteReason>().unwrap(), reason);
        }
        let err = "stolen".parse::<WasteReason>().unwrap_err();
        assert_eq!(err.to_string(), "unknown waste reason 'stolen'");
    }

    #[test]
    fn test_sync_status_from_bool() {
        assert!(SyncStatus::from(true).is_synced());
        assert!(!SyncStatus::from(false).is_synced());
        assert_eq!(SyncStatus::default(), SyncStatus::Unsynced);
    }
}
