//! Data models for the product catalog and production plans

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;

/// Fractional digits of a produced quantity.
pub const QUANTITY_SCALE: u32 = 3;

/// Fractional digits of a monetary value.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawMaterialId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RawMaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub unit_value: Decimal,
}

impl Product {
    /// Planning priority: higher unit value first, then name, then id.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        other
            .unit_value
            .cmp(&self.unit_value)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sort products into planning priority order.
pub fn sort_by_priority(products: &mut [Product]) {
    products.sort_by(Product::priority_cmp);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMaterial {
    pub id: RawMaterialId,
    pub code: String,
    pub name: String,
    pub stock_quantity: Decimal,
}

/// Quantity of one raw material consumed by one unit of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub product_id: ProductId,
    pub raw_material_id: RawMaterialId,
    pub required_quantity: Decimal,
}

/// Fields of a product before it has been stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub unit_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRawMaterial {
    pub code: String,
    pub name: String,
    pub stock_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequirement {
    pub product_id: ProductId,
    pub raw_material_id: RawMaterialId,
    pub required_quantity: Decimal,
}

/// One product in a production plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLineItem {
    pub product_id: ProductId,
    pub product_code: String,
    pub product_name: String,
    pub unit_value: Decimal,
    /// Units produced, scale 3.
    pub quantity: Decimal,
    /// `unit_value * quantity`, rounded half-up to scale 2.
    pub total_value: Decimal,
}

/// Result of a production plan calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanResult {
    pub items: Vec<PlanLineItem>,
    pub total_value: Decimal,
}

impl PlanResult {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_value: Decimal::ZERO.round_half_up(MONEY_SCALE),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
