//! Status enums for catalog and reminder entities.

use serde::{Deserialize, Deserializer, Serialize};

/// Stock status reported by the commerce API.
///
/// Unknown values deserialize to [`StockStatus::OutOfStock`] so a new
/// upstream status never makes an item purchasable by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum StockStatus {
    #[serde(rename = "instock")]
    InStock,
    #[default]
    #[serde(rename = "outofstock")]
    OutOfStock,
    #[serde(rename = "onbackorder")]
    OnBackorder,
}

impl StockStatus {
    /// Parse the commerce API wire value.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "instock" => Self::InStock,
            "onbackorder" => Self::OnBackorder,
            _ => Self::OutOfStock,
        }
    }

    /// Human-readable label for templates.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InStock => "In stock",
            Self::OutOfStock => "Out of stock",
            Self::OnBackorder => "Available on backorder",
        }
    }
}

impl<'de> Deserialize<'de> for StockStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// Outcome recorded for a single reminder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStatus {
    Taken,
    Skipped,
}

impl std::fmt::Display for IntakeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Taken => write!(f, "taken"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for IntakeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "taken" => Ok(Self::Taken),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("invalid intake status: {s}")),
        }
    }
}

/// Storage temperature class of a product.
///
/// Derived from catalog signals at read time; never stored upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColdChainClass {
    /// Room temperature storage.
    #[default]
    Ambient,
    /// 2-8 °C storage.
    Refrigerated,
    /// Below -15 °C storage.
    Frozen,
}

impl ColdChainClass {
    /// Whether the item must ship with cooling packaging.
    #[must_use]
    pub const fn requires_cold_shipping(&self) -> bool {
        !matches!(self, Self::Ambient)
    }

    /// Short label for product badges.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ambient => "Room temperature",
            Self::Refrigerated => "Refrigerated (2-8 °C)",
            Self::Frozen => "Frozen",
        }
    }
}
