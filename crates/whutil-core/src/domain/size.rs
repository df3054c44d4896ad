use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Warehouse size tiers, smallest first.
///
/// Each tier consumes twice the credits per hour of the tier below it. This
/// table is the only place the size to capacity mapping is written down; the
/// SQL builder and the calculator both read it from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarehouseSize {
    #[serde(rename = "X-Small")]
    XSmall,
    #[serde(rename = "Small")]
    Small,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Large")]
    Large,
    #[serde(rename = "X-Large")]
    XLarge,
    #[serde(rename = "2X-Large")]
    X2Large,
    #[serde(rename = "3X-Large")]
    X3Large,
    #[serde(rename = "4X-Large")]
    X4Large,
    #[serde(rename = "5X-Large")]
    X5Large,
    #[serde(rename = "6X-Large")]
    X6Large,
}

impl WarehouseSize {
    pub const ALL: [Self; 10] = [
        Self::XSmall,
        Self::Small,
        Self::Medium,
        Self::Large,
        Self::XLarge,
        Self::X2Large,
        Self::X3Large,
        Self::X4Large,
        Self::X5Large,
        Self::X6Large,
    ];

    /// Label as recorded by the warehouse service's query log.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XSmall => "X-Small",
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
            Self::XLarge => "X-Large",
            Self::X2Large => "2X-Large",
            Self::X3Large => "3X-Large",
            Self::X4Large => "4X-Large",
            Self::X5Large => "5X-Large",
            Self::X6Large => "6X-Large",
        }
    }

    /// Credits consumed per hour of uptime at this size.
    pub const fn credits_per_hour(self) -> u32 {
        1 << (self as u32)
    }

    /// Parse a label, returning `None` for anything outside the enumeration.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(label))
    }
}

/// Capacity for a raw size label; unknown or missing labels map to zero.
pub fn capacity_for_label(label: Option<&str>) -> u32 {
    label
        .and_then(WarehouseSize::from_label)
        .map_or(0, WarehouseSize::credits_per_hour)
}

impl Display for WarehouseSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarehouseSize {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_label(value).ok_or_else(|| ValidationError::InvalidWarehouseSize {
            value: value.trim().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacities_double_from_one_to_512() {
        let capacities = WarehouseSize::ALL
            .iter()
            .map(|size| size.credits_per_hour())
            .collect::<Vec<_>>();
        assert_eq!(capacities, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512]);
        assert!(capacities.windows(2).all(|pair| pair[1] == pair[0] * 2));
    }

    #[test]
    fn unknown_or_missing_label_has_zero_capacity() {
        assert_eq!(capacity_for_label(Some("Medium")), 4);
        assert_eq!(capacity_for_label(Some("7X-Large")), 0);
        assert_eq!(capacity_for_label(Some("")), 0);
        assert_eq!(capacity_for_label(None), 0);
    }

    #[test]
    fn parses_labels_case_insensitively() {
        let size = WarehouseSize::from_str(" x-small ").expect("must parse");
        assert_eq!(size, WarehouseSize::XSmall);
        assert_eq!("2X-LARGE".parse::<WarehouseSize>(), Ok(WarehouseSize::X2Large));
    }

    #[test]
    fn rejects_unknown_label() {
        let err = WarehouseSize::from_str("Huge").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidWarehouseSize { .. }));
    }

    #[test]
    fn serializes_as_service_label() {
        let json = serde_json::to_string(&WarehouseSize::X4Large).expect("serializes");
        assert_eq!(json, "\"4X-Large\"");
    }
}
