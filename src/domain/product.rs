//! Product document with embedded inventory.
//!
//! Read-only to the cart and checkout engines; mutated by catalog admin
//! operations and by the conditional stock decrement at checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub unit: Unit,
    pub sku: String,
    pub barcode: String,
    pub image_url: String,
    pub status: ProductStatus,
    pub inventory: Inventory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inventory record embedded in the product document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Inventory {
    pub stock: u32,
    pub min_stock: u32,
    /// Absent or non-positive means the product cannot be sold yet.
    pub price: Option<Decimal>,
}

impl Inventory {
    pub fn low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// The current sale price, if one is defined and positive.
    pub fn sale_price(&self) -> Option<Decimal> {
        self.inventory.price.filter(|p| *p > Decimal::ZERO)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Closed list of selling units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Each,
    Pair,
    Pack,
    Meter,
    Centimeter,
    Kilogram,
    Gram,
    Liter,
    Milliliter,
    Box,
    Bag,
    Kit,
    Other,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Each => "each",
            Self::Pair => "pair",
            Self::Pack => "pack",
            Self::Meter => "meter",
            Self::Centimeter => "centimeter",
            Self::Kilogram => "kilogram",
            Self::Gram => "gram",
            Self::Liter => "liter",
            Self::Milliliter => "milliliter",
            Self::Box => "box",
            Self::Bag => "bag",
            Self::Kit => "kit",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "each" => Some(Self::Each),
            "pair" => Some(Self::Pair),
            "pack" => Some(Self::Pack),
            "meter" => Some(Self::Meter),
            "centimeter" => Some(Self::Centimeter),
            "kilogram" => Some(Self::Kilogram),
            "gram" => Some(Self::Gram),
            "liter" => Some(Self::Liter),
            "milliliter" => Some(Self::Milliliter),
            "box" => Some(Self::Box),
            "bag" => Some(Self::Bag),
            "kit" => Some(Self::Kit),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn sale_price_requires_positive_price() {
        let mut p = testutil::product(100, 10);
        assert_eq!(p.sale_price(), Some(Decimal::from(100)));
        p.inventory.price = Some(Decimal::ZERO);
        assert_eq!(p.sale_price(), None);
        p.inventory.price = None;
        assert_eq!(p.sale_price(), None);
    }

    #[test]
    fn low_stock_compares_against_minimum() {
        let mut p = testutil::product(100, 10);
        p.inventory.min_stock = 3;
        assert!(!p.inventory.low_stock());
        p.inventory.stock = 3;
        assert!(p.inventory.low_stock());
    }

    #[test]
    fn unit_round_trips_through_text() {
        for unit in [Unit::Each, Unit::Kilogram, Unit::Milliliter, Unit::Other] {
            assert_eq!(Unit::parse(unit.as_str()), Some(unit));
        }
        assert_eq!(Unit::parse("furlong"), None);
    }
}
