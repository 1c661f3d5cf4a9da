//! Point-in-time catalog views handed to the planner

use std::collections::HashMap;

use tracing::debug;

use crate::calculator::{self, RequirementsByProduct, StockLevels};
use crate::error::CatalogResult;
use crate::models::{PlanResult, Product, ProductId, Requirement};

/// Read side of a product catalog, as seen by the planner.
pub trait Catalog {
    /// All products, sorted by [`Product::priority_cmp`].
    fn list_products_by_priority(&self) -> CatalogResult<Vec<Product>>;

    /// Requirements of one product. Empty when the product has none.
    fn list_requirements(&self, product_id: ProductId) -> CatalogResult<Vec<Requirement>>;

    /// Current stock of every raw material.
    fn current_stock_snapshot(&self) -> CatalogResult<StockLevels>;
}

/// Immutable copy of everything one plan calculation needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogSnapshot {
    pub products: Vec<Product>,
    pub requirements: RequirementsByProduct,
    pub stock: StockLevels,
}

impl CatalogSnapshot {
    /// Read products, requirements and stock from `catalog` once.
    pub fn capture<C: Catalog + ?Sized>(catalog: &C) -> CatalogResult<Self> {
        let products = catalog.list_products_by_priority()?;

        let mut requirements = HashMap::with_capacity(products.len());
        for product in &products {
            let reqs = catalog.list_requirements(product.id)?;
            if !reqs.is_empty() {
                requirements.insert(product.id, reqs);
            }
        }

        let stock = catalog.current_stock_snapshot()?;

        debug!(
            products = products.len(),
            with_requirements = requirements.len(),
            raw_materials = stock.len(),
            "captured catalog snapshot"
        );

        Ok(Self {
            products,
            requirements,
            stock,
        })
    }

    pub fn compute_plan(&self) -> PlanResult {
        calculator::compute_plan(&self.products, &self.requirements, &self.stock)
    }
}
