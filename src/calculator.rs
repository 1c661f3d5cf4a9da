//! Production plan calculator logic
//!
//! Greedy allocation of raw-material stock to products. Products are visited
//! once, in priority order; each one takes as many units as its scarcest raw
//! material allows, and whatever it consumes is gone for everything after it.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info};

use crate::decimal::Decimal;
use crate::models::{
    MONEY_SCALE, PlanLineItem, PlanResult, Product, ProductId, QUANTITY_SCALE, RawMaterialId,
    Requirement,
};

pub type RequirementsByProduct = HashMap<ProductId, Vec<Requirement>>;
pub type StockLevels = HashMap<RawMaterialId, Decimal>;

/// Calculate how many units of each product the given stock can cover.
///
/// `products` must already be in priority order (see
/// [`Product::priority_cmp`]); they are processed exactly in that order.
/// `stock` is copied before use and never modified.
///
/// Each product may list a raw material at most once in `requirements`.
///
/// # Panics
///
/// Panics if any stock level or required quantity is negative. Those values
/// come from the catalog, which must never hold them.
pub fn compute_plan(
    products: &[Product],
    requirements: &RequirementsByProduct,
    stock: &StockLevels,
) -> PlanResult {
    debug_assert!(
        products.is_sorted_by(|a, b| a.priority_cmp(b).is_le()),
        "products must be sorted by priority"
    );
    for (material, quantity) in stock {
        assert!(
            !quantity.is_negative(),
            "raw material {material} has negative stock {quantity}"
        );
    }

    let mut available = stock.clone();
    let mut items = Vec::new();
    let mut total_value = Decimal::new(0, MONEY_SCALE);

    for product in products {
        let reqs = requirements
            .get(&product.id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let quantity = producible_quantity(reqs, &available);
        if !quantity.is_positive() {
            debug!(product = %product.code, "not producible with remaining stock");
            continue;
        }

        consume(reqs, quantity, &mut available);

        let item_total = (product.unit_value * quantity).round_half_up(MONEY_SCALE);
        total_value += item_total;

        debug!(
            product = %product.code,
            quantity = %quantity,
            total = %item_total,
            "planned product"
        );

        items.push(PlanLineItem {
            product_id: product.id,
            product_code: product.code.clone(),
            product_name: product.name.clone(),
            unit_value: product.unit_value,
            quantity,
            total_value: item_total,
        });
    }

    info!(
        items = items.len(),
        total_value = %total_value,
        "production plan complete"
    );

    PlanResult { items, total_value }
}

/// Stock on hand for a raw material; materials without an entry have none.
fn stock_of(available: &StockLevels, material: RawMaterialId) -> Decimal {
    available.get(&material).copied().unwrap_or(Decimal::ZERO)
}

/// Units the scarcest raw material allows, floored to [`QUANTITY_SCALE`].
///
/// Requirements of zero do not constrain anything. With no constraining
/// requirement at all the product is not producible.
fn producible_quantity(reqs: &[Requirement], available: &StockLevels) -> Decimal {
    reqs.iter()
        .inspect(|req| {
            assert!(
                !req.required_quantity.is_negative(),
                "requirement {} has negative quantity {}",
                req.id,
                req.required_quantity
            )
        })
        .filter_map(|req| {
            stock_of(available, req.raw_material_id)
                .checked_div_floor(req.required_quantity, QUANTITY_SCALE)
        })
        .min()
        .unwrap_or(Decimal::new(0, QUANTITY_SCALE))
}

fn consume(reqs: &[Requirement], quantity: Decimal, available: &mut StockLevels) {
    for req in reqs {
        let used = req.required_quantity * quantity;
        let remaining = stock_of(available, req.raw_material_id) - used;
        available.insert(req.raw_material_id, remaining);
    }
}

/// Format a production plan as a readable table
pub fn format_plan(plan: &PlanResult) -> String {
    plan.to_string()
}

impl fmt::Display for PlanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Production Plan ===")?;
        if self.items.is_empty() {
            writeln!(f, "Nothing can be produced with the current stock.")?;
        } else {
            writeln!(
                f,
                "{:<12} {:<30} {:>12} {:>12} {:>14}",
                "Code", "Product", "Unit value", "Quantity", "Total"
            )?;
            writeln!(f, "{}", "-".repeat(84))?;
            for item in &self.items {
                writeln!(
                    f,
                    "{:<12} {:<30} {:>12} {:>12} {:>14}",
                    item.product_code,
                    item.product_name,
                    item.unit_value.to_string(),
                    item.quantity.to_string(),
                    item.total_value.to_string()
                )?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Total value: {}", self.total_value)?;
        Ok(())
    }
}
