//! Database schema and catalog operations

use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use tracing::debug;

use crate::calculator::StockLevels;
use crate::decimal::Decimal;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    MONEY_SCALE, NewProduct, NewRawMaterial, NewRequirement, Product, ProductId, RawMaterial,
    RawMaterialId, Requirement, RequirementId, sort_by_priority,
};
use crate::snapshot::Catalog;

const MAX_CODE_LEN: usize = 50;
const MAX_NAME_LEN: usize = 200;
/// Fractional digits stored for stock and bill-of-material quantities.
const STOCK_SCALE: u32 = 3;
/// Most digits a stored decimal may carry, fractional digits included.
const MAX_PRECISION: u32 = 10;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> CatalogResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            unit_value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_materials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            stock_quantity TEXT NOT NULL
        );

        -- Bill of materials: quantity of a raw material per unit of product
        CREATE TABLE IF NOT EXISTS product_raw_materials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            raw_material_id INTEGER NOT NULL REFERENCES raw_materials(id) ON DELETE RESTRICT,
            required_quantity TEXT NOT NULL,
            UNIQUE (product_id, raw_material_id)
        );

        CREATE INDEX IF NOT EXISTS idx_requirements_product ON product_raw_materials(product_id);
        CREATE INDEX IF NOT EXISTS idx_requirements_material ON product_raw_materials(raw_material_id);
        "#,
    )?;
    Ok(())
}

/// Remove every product, raw material and requirement
pub fn clear_catalog(conn: &Connection) -> CatalogResult<()> {
    conn.execute_batch(
        r#"
        DELETE FROM product_raw_materials;
        DELETE FROM products;
        DELETE FROM raw_materials;
        "#,
    )?;
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_text(field: &str, value: &str, max_len: usize) -> CatalogResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(CatalogError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_scale(field: &str, value: Decimal, scale: u32) -> CatalogResult<Decimal> {
    if value.significant_scale() > scale {
        return Err(CatalogError::validation(format!(
            "{field} allows at most {scale} decimal places"
        )));
    }
    let stored = value.floor_to(scale);
    if stored.precision() > MAX_PRECISION {
        return Err(CatalogError::validation(format!(
            "{field} allows at most {MAX_PRECISION} digits with {scale} decimal places"
        )));
    }
    Ok(stored)
}

fn validate_product(input: &NewProduct) -> CatalogResult<NewProduct> {
    if !input.unit_value.is_positive() {
        return Err(CatalogError::validation("value must be positive"));
    }
    Ok(NewProduct {
        code: validate_text("code", &input.code, MAX_CODE_LEN)?,
        name: validate_text("name", &input.name, MAX_NAME_LEN)?,
        unit_value: validate_scale("value", input.unit_value, MONEY_SCALE)?,
    })
}

fn validate_raw_material(input: &NewRawMaterial) -> CatalogResult<NewRawMaterial> {
    if input.stock_quantity.is_negative() {
        return Err(CatalogError::validation(
            "stock quantity must be zero or positive",
        ));
    }
    Ok(NewRawMaterial {
        code: validate_text("code", &input.code, MAX_CODE_LEN)?,
        name: validate_text("name", &input.name, MAX_NAME_LEN)?,
        stock_quantity: validate_scale("stock quantity", input.stock_quantity, STOCK_SCALE)?,
    })
}

fn validate_requirement(input: &NewRequirement) -> CatalogResult<NewRequirement> {
    if !input.required_quantity.is_positive() {
        return Err(CatalogError::validation(
            "required quantity must be positive",
        ));
    }
    Ok(NewRequirement {
        required_quantity: validate_scale(
            "required quantity",
            input.required_quantity,
            STOCK_SCALE,
        )?,
        ..input.clone()
    })
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: ProductId(row.get(0)?),
        code: row.get(1)?,
        name: row.get(2)?,
        unit_value: row.get(3)?,
    })
}

/// Insert a new product; its code must not be in use
pub fn create_product(conn: &Connection, input: &NewProduct) -> CatalogResult<Product> {
    let input = validate_product(input)?;
    if find_product_by_code(conn, &input.code)?.is_some() {
        return Err(CatalogError::conflict(format!(
            "product with code {} already exists",
            input.code
        )));
    }

    conn.execute(
        "INSERT INTO products (code, name, unit_value) VALUES (?1, ?2, ?3)",
        params![input.code, input.name, input.unit_value],
    )?;
    let id = ProductId(conn.last_insert_rowid());
    debug!(product = %input.code, %id, "created product");

    Ok(Product {
        id,
        code: input.code,
        name: input.name,
        unit_value: input.unit_value,
    })
}

/// Replace the code, name and value of an existing product
pub fn update_product(
    conn: &Connection,
    id: ProductId,
    input: &NewProduct,
) -> CatalogResult<Product> {
    let input = validate_product(input)?;
    let current = get_product(conn, id)?;

    if current.code != input.code {
        if let Some(other) = find_product_by_code(conn, &input.code)? {
            if other.id != id {
                return Err(CatalogError::conflict(format!(
                    "product with code {} already exists",
                    input.code
                )));
            }
        }
    }

    conn.execute(
        "UPDATE products SET code = ?1, name = ?2, unit_value = ?3 WHERE id = ?4",
        params![input.code, input.name, input.unit_value, id.0],
    )?;

    Ok(Product {
        id,
        code: input.code,
        name: input.name,
        unit_value: input.unit_value,
    })
}

/// Delete a product together with its requirements
pub fn delete_product(conn: &Connection, id: ProductId) -> CatalogResult<()> {
    let deleted = conn.execute("DELETE FROM products WHERE id = ?1", [id.0])?;
    if deleted == 0 {
        return Err(CatalogError::not_found(format!("product with id {id}")));
    }
    Ok(())
}

pub fn get_product(conn: &Connection, id: ProductId) -> CatalogResult<Product> {
    conn.query_row(
        "SELECT id, code, name, unit_value FROM products WHERE id = ?1",
        [id.0],
        product_from_row,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found(format!("product with id {id}")))
}

pub fn find_product_by_code(conn: &Connection, code: &str) -> CatalogResult<Option<Product>> {
    Ok(conn
        .query_row(
            "SELECT id, code, name, unit_value FROM products WHERE code = ?1",
            [code.trim()],
            product_from_row,
        )
        .optional()?)
}

/// List all products ordered by name
pub fn list_products(conn: &Connection) -> CatalogResult<Vec<Product>> {
    let mut stmt =
        conn.prepare("SELECT id, code, name, unit_value FROM products ORDER BY name, id")?;
    let rows = stmt.query_map([], product_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all products in planning priority order
pub fn list_products_by_priority(conn: &Connection) -> CatalogResult<Vec<Product>> {
    // Values are stored as text, so numeric ordering happens here rather than in SQL.
    let mut products = list_products(conn)?;
    sort_by_priority(&mut products);
    Ok(products)
}

// ---------------------------------------------------------------------------
// Raw materials
// ---------------------------------------------------------------------------

fn raw_material_from_row(row: &Row<'_>) -> rusqlite::Result<RawMaterial> {
    Ok(RawMaterial {
        id: RawMaterialId(row.get(0)?),
        code: row.get(1)?,
        name: row.get(2)?,
        stock_quantity: row.get(3)?,
    })
}

/// Insert a new raw material; its code must not be in use
pub fn create_raw_material(
    conn: &Connection,
    input: &NewRawMaterial,
) -> CatalogResult<RawMaterial> {
    let input = validate_raw_material(input)?;
    if find_raw_material_by_code(conn, &input.code)?.is_some() {
        return Err(CatalogError::conflict(format!(
            "raw material with code {} already exists",
            input.code
        )));
    }

    conn.execute(
        "INSERT INTO raw_materials (code, name, stock_quantity) VALUES (?1, ?2, ?3)",
        params![input.code, input.name, input.stock_quantity],
    )?;
    let id = RawMaterialId(conn.last_insert_rowid());
    debug!(raw_material = %input.code, %id, "created raw material");

    Ok(RawMaterial {
        id,
        code: input.code,
        name: input.name,
        stock_quantity: input.stock_quantity,
    })
}

pub fn update_raw_material(
    conn: &Connection,
    id: RawMaterialId,
    input: &NewRawMaterial,
) -> CatalogResult<RawMaterial> {
    let input = validate_raw_material(input)?;
    let current = get_raw_material(conn, id)?;

    if current.code != input.code {
        if let Some(other) = find_raw_material_by_code(conn, &input.code)? {
            if other.id != id {
                return Err(CatalogError::conflict(format!(
                    "raw material with code {} already exists",
                    input.code
                )));
            }
        }
    }

    conn.execute(
        "UPDATE raw_materials SET code = ?1, name = ?2, stock_quantity = ?3 WHERE id = ?4",
        params![input.code, input.name, input.stock_quantity, id.0],
    )?;

    Ok(RawMaterial {
        id,
        code: input.code,
        name: input.name,
        stock_quantity: input.stock_quantity,
    })
}

/// Delete a raw material that no product requires
pub fn delete_raw_material(conn: &Connection, id: RawMaterialId) -> CatalogResult<()> {
    let material = get_raw_material(conn, id)?;
    let users = list_requirements_for_raw_material(conn, id)?;
    if !users.is_empty() {
        return Err(CatalogError::conflict(format!(
            "raw material {} is required by {} product(s)",
            material.code,
            users.len()
        )));
    }

    match conn.execute("DELETE FROM raw_materials WHERE id = ?1", [id.0]) {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(CatalogError::conflict(format!(
            "raw material {} is still required by a product",
            material.code
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn get_raw_material(conn: &Connection, id: RawMaterialId) -> CatalogResult<RawMaterial> {
    conn.query_row(
        "SELECT id, code, name, stock_quantity FROM raw_materials WHERE id = ?1",
        [id.0],
        raw_material_from_row,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found(format!("raw material with id {id}")))
}

pub fn find_raw_material_by_code(
    conn: &Connection,
    code: &str,
) -> CatalogResult<Option<RawMaterial>> {
    Ok(conn
        .query_row(
            "SELECT id, code, name, stock_quantity FROM raw_materials WHERE code = ?1",
            [code.trim()],
            raw_material_from_row,
        )
        .optional()?)
}

/// List all raw materials ordered by name
pub fn list_raw_materials(conn: &Connection) -> CatalogResult<Vec<RawMaterial>> {
    let mut stmt = conn
        .prepare("SELECT id, code, name, stock_quantity FROM raw_materials ORDER BY name, id")?;
    let rows = stmt.query_map([], raw_material_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Current stock level of every raw material
pub fn stock_snapshot(conn: &Connection) -> CatalogResult<StockLevels> {
    let mut stmt = conn.prepare("SELECT id, stock_quantity FROM raw_materials")?;
    let rows = stmt.query_map([], |row| {
        Ok((RawMaterialId(row.get(0)?), row.get::<_, Decimal>(1)?))
    })?;

    let mut stock = StockLevels::new();
    for row in rows {
        let (id, quantity) = row?;
        stock.insert(id, quantity);
    }
    Ok(stock)
}

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

const REQUIREMENT_COLUMNS: &str = "id, product_id, raw_material_id, required_quantity";

fn requirement_from_row(row: &Row<'_>) -> rusqlite::Result<Requirement> {
    Ok(Requirement {
        id: RequirementId(row.get(0)?),
        product_id: ProductId(row.get(1)?),
        raw_material_id: RawMaterialId(row.get(2)?),
        required_quantity: row.get(3)?,
    })
}

fn query_requirements(
    conn: &Connection,
    filter: &str,
    param: Option<i64>,
) -> CatalogResult<Vec<Requirement>> {
    let sql = format!("SELECT {REQUIREMENT_COLUMNS} FROM product_raw_materials {filter} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = match param {
        Some(p) => stmt.query_map([p], requirement_from_row)?,
        None => stmt.query_map([], requirement_from_row)?,
    };

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Link a raw material to a product; both must exist and not be linked yet
pub fn create_requirement(
    conn: &Connection,
    input: &NewRequirement,
) -> CatalogResult<Requirement> {
    let input = validate_requirement(input)?;
    let product = get_product(conn, input.product_id)?;
    let material = get_raw_material(conn, input.raw_material_id)?;

    if find_requirement(conn, input.product_id, input.raw_material_id)?.is_some() {
        return Err(CatalogError::conflict(format!(
            "product {} already requires raw material {}",
            product.code, material.code
        )));
    }

    conn.execute(
        "INSERT INTO product_raw_materials (product_id, raw_material_id, required_quantity)
         VALUES (?1, ?2, ?3)",
        params![input.product_id.0, input.raw_material_id.0, input.required_quantity],
    )?;
    let id = RequirementId(conn.last_insert_rowid());
    debug!(product = %product.code, raw_material = %material.code, %id, "created requirement");

    Ok(Requirement {
        id,
        product_id: input.product_id,
        raw_material_id: input.raw_material_id,
        required_quantity: input.required_quantity,
    })
}

/// Re-point and/or re-quantify an existing requirement
pub fn update_requirement(
    conn: &Connection,
    id: RequirementId,
    input: &NewRequirement,
) -> CatalogResult<Requirement> {
    let input = validate_requirement(input)?;
    let current = get_requirement(conn, id)?;

    if current.product_id != input.product_id {
        get_product(conn, input.product_id)?;
    }
    if current.raw_material_id != input.raw_material_id {
        get_raw_material(conn, input.raw_material_id)?;
    }
    if let Some(other) = find_requirement(conn, input.product_id, input.raw_material_id)? {
        if other.id != id {
            return Err(CatalogError::conflict(format!(
                "product {} already requires raw material {}",
                input.product_id, input.raw_material_id
            )));
        }
    }

    conn.execute(
        "UPDATE product_raw_materials
         SET product_id = ?1, raw_material_id = ?2, required_quantity = ?3
         WHERE id = ?4",
        params![
            input.product_id.0,
            input.raw_material_id.0,
            input.required_quantity,
            id.0
        ],
    )?;

    Ok(Requirement {
        id,
        product_id: input.product_id,
        raw_material_id: input.raw_material_id,
        required_quantity: input.required_quantity,
    })
}

pub fn delete_requirement(conn: &Connection, id: RequirementId) -> CatalogResult<()> {
    let deleted = conn.execute("DELETE FROM product_raw_materials WHERE id = ?1", [id.0])?;
    if deleted == 0 {
        return Err(CatalogError::not_found(format!("requirement with id {id}")));
    }
    Ok(())
}

pub fn get_requirement(conn: &Connection, id: RequirementId) -> CatalogResult<Requirement> {
    conn.query_row(
        &format!("SELECT {REQUIREMENT_COLUMNS} FROM product_raw_materials WHERE id = ?1"),
        [id.0],
        requirement_from_row,
    )
    .optional()?
    .ok_or_else(|| CatalogError::not_found(format!("requirement with id {id}")))
}

pub fn find_requirement(
    conn: &Connection,
    product_id: ProductId,
    raw_material_id: RawMaterialId,
) -> CatalogResult<Option<Requirement>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {REQUIREMENT_COLUMNS} FROM product_raw_materials
                 WHERE product_id = ?1 AND raw_material_id = ?2"
            ),
            [product_id.0, raw_material_id.0],
            requirement_from_row,
        )
        .optional()?)
}

pub fn list_requirements(conn: &Connection) -> CatalogResult<Vec<Requirement>> {
    query_requirements(conn, "", None)
}

pub fn list_requirements_for_product(
    conn: &Connection,
    product_id: ProductId,
) -> CatalogResult<Vec<Requirement>> {
    query_requirements(conn, "WHERE product_id = ?1", Some(product_id.0))
}

pub fn list_requirements_for_raw_material(
    conn: &Connection,
    raw_material_id: RawMaterialId,
) -> CatalogResult<Vec<Requirement>> {
    query_requirements(conn, "WHERE raw_material_id = ?1", Some(raw_material_id.0))
}

// ---------------------------------------------------------------------------
// Upserts by code (bulk loading)
// ---------------------------------------------------------------------------

/// Insert a product, or overwrite the one with the same code.
///
/// Returns the stored product and whether it was newly created.
pub fn upsert_product(conn: &Connection, input: &NewProduct) -> CatalogResult<(Product, bool)> {
    match find_product_by_code(conn, &input.code)? {
        Some(existing) => Ok((update_product(conn, existing.id, input)?, false)),
        None => Ok((create_product(conn, input)?, true)),
    }
}

pub fn upsert_raw_material(
    conn: &Connection,
    input: &NewRawMaterial,
) -> CatalogResult<(RawMaterial, bool)> {
    match find_raw_material_by_code(conn, &input.code)? {
        Some(existing) => Ok((update_raw_material(conn, existing.id, input)?, false)),
        None => Ok((create_raw_material(conn, input)?, true)),
    }
}

/// Create the requirement for this product and material, or change its quantity.
pub fn upsert_requirement(
    conn: &Connection,
    input: &NewRequirement,
) -> CatalogResult<(Requirement, bool)> {
    match find_requirement(conn, input.product_id, input.raw_material_id)? {
        Some(existing) => Ok((update_requirement(conn, existing.id, input)?, false)),
        None => Ok((create_requirement(conn, input)?, true)),
    }
}

impl Catalog for Connection {
    fn list_products_by_priority(&self) -> CatalogResult<Vec<Product>> {
        list_products_by_priority(self)
    }

    fn list_requirements(&self, product_id: ProductId) -> CatalogResult<Vec<Requirement>> {
        list_requirements_for_product(self, product_id)
    }

    fn current_stock_snapshot(&self) -> CatalogResult<StockLevels> {
        stock_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::CatalogSnapshot;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn new_product(code: &str, name: &str, value: &str) -> NewProduct {
        NewProduct {
            code: code.to_string(),
            name: name.to_string(),
            unit_value: d(value),
        }
    }

    fn new_material(code: &str, name: &str, stock: &str) -> NewRawMaterial {
        NewRawMaterial {
            code: code.to_string(),
            name: name.to_string(),
            stock_quantity: d(stock),
        }
    }

    fn link(conn: &Connection, product: &Product, material: &RawMaterial, qty: &str) -> Requirement {
        create_requirement(
            conn,
            &NewRequirement {
                product_id: product.id,
                raw_material_id: material.id,
                required_quantity: d(qty),
            },
        )
        .unwrap()
    }

    #[test]
    fn product_round_trips_with_fixed_scale() {
        let conn = open();
        let created = create_product(&conn, &new_product(" P001 ", "Table", "100")).unwrap();
        assert_eq!(created.code, "P001");
        assert_eq!(created.unit_value.to_string(), "100.00");

        let fetched = get_product(&conn, created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.unit_value.to_string(), "100.00");

        let by_code = find_product_by_code(&conn, "P001").unwrap();
        assert_eq!(by_code, Some(created));
    }

    #[test]
    fn duplicate_product_code_is_a_conflict() {
        let conn = open();
        create_product(&conn, &new_product("P001", "Table", "10")).unwrap();
        let err = create_product(&conn, &new_product("P001", "Chair", "5")).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn product_update_rejects_code_of_another_product() {
        let conn = open();
        create_product(&conn, &new_product("P001", "Table", "10")).unwrap();
        let chair = create_product(&conn, &new_product("P002", "Chair", "5")).unwrap();

        let err = update_product(&conn, chair.id, &new_product("P001", "Chair", "5")).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));

        let renamed = update_product(&conn, chair.id, &new_product("P002", "Stool", "7.5")).unwrap();
        assert_eq!(renamed.name, "Stool");
        assert_eq!(get_product(&conn, chair.id).unwrap().unit_value.to_string(), "7.50");
    }

    #[test]
    fn product_validation_rules() {
        let conn = open();
        let cases = [
            new_product("", "Table", "10"),
            new_product("P001", "   ", "10"),
            new_product("P001", "Table", "0"),
            new_product("P001", "Table", "-1"),
            new_product("P001", "Table", "10.001"),
            new_product(&"X".repeat(51), "Table", "10"),
        ];
        for input in cases {
            let err = create_product(&conn, &input).unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)), "{input:?}");
        }
        assert!(list_products(&conn).unwrap().is_empty());
    }

    #[test]
    fn values_beyond_ten_digits_are_rejected() {
        let conn = open();
        let err = create_product(&conn, &new_product("P001", "Table", "100000000.00")).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        let err = create_raw_material(&conn, &new_material("RM001", "Wood", "10000000")).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let table = create_product(&conn, &new_product("P001", "Table", "99999999.99")).unwrap();
        let wood = create_raw_material(&conn, &new_material("RM001", "Wood", "9999999.999")).unwrap();
        let err = create_requirement(
            &conn,
            &NewRequirement {
                product_id: table.id,
                raw_material_id: wood.id,
                required_quantity: d("10000000"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[test]
    fn largest_storable_values_plan_without_overflow() {
        let conn = open();
        let table = create_product(&conn, &new_product("P001", "Table", "99999999.99")).unwrap();
        let wood = create_raw_material(&conn, &new_material("RM001", "Wood", "9999999.999")).unwrap();
        link(&conn, &table, &wood, "0.001");

        let plan = CatalogSnapshot::capture(&conn).unwrap().compute_plan();
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].quantity.to_string(), "9999999999.000");
        assert_eq!(plan.items[0].total_value.to_string(), "999999999800000000.01");
        assert_eq!(plan.total_value.to_string(), "999999999800000000.01");
    }

    #[test]
    fn raw_material_validation_allows_zero_stock() {
        let conn = open();
        let steel = create_raw_material(&conn, &new_material("RM001", "Steel", "0")).unwrap();
        assert_eq!(steel.stock_quantity.to_string(), "0.000");

        let err = create_raw_material(&conn, &new_material("RM002", "Glue", "-0.001")).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let err = create_raw_material(&conn, &new_material("RM002", "Glue", "1.0001")).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[test]
    fn missing_rows_are_not_found() {
        let conn = open();
        assert!(matches!(
            get_product(&conn, ProductId(42)),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            delete_raw_material(&conn, RawMaterialId(42)),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            delete_requirement(&conn, RequirementId(42)),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn requirement_needs_existing_product_and_material() {
        let conn = open();
        let table = create_product(&conn, &new_product("P001", "Table", "10")).unwrap();

        let err = create_requirement(
            &conn,
            &NewRequirement {
                product_id: table.id,
                raw_material_id: RawMaterialId(99),
                required_quantity: d("1"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn requirement_rules() {
        let conn = open();
        let table = create_product(&conn, &new_product("P001", "Table", "10")).unwrap();
        let wood = create_raw_material(&conn, &new_material("RM001", "Wood", "20")).unwrap();

        let err = create_requirement(
            &conn,
            &NewRequirement {
                product_id: table.id,
                raw_material_id: wood.id,
                required_quantity: d("0"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let req = link(&conn, &table, &wood, "4");
        assert_eq!(req.required_quantity.to_string(), "4.000");

        let err = create_requirement(
            &conn,
            &NewRequirement {
                product_id: table.id,
                raw_material_id: wood.id,
                required_quantity: d("2"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));

        let updated = update_requirement(
            &conn,
            req.id,
            &NewRequirement {
                product_id: table.id,
                raw_material_id: wood.id,
                required_quantity: d("2.5"),
            },
        )
        .unwrap();
        assert_eq!(get_requirement(&conn, req.id).unwrap(), updated);
        assert_eq!(list_requirements_for_product(&conn, table.id).unwrap(), vec![updated.clone()]);
        assert_eq!(list_requirements_for_raw_material(&conn, wood.id).unwrap(), vec![updated]);
    }

    #[test]
    fn deleting_product_cascades_requirements() {
        let conn = open();
        let table = create_product(&conn, &new_product("P001", "Table", "10")).unwrap();
        let wood = create_raw_material(&conn, &new_material("RM001", "Wood", "20")).unwrap();
        link(&conn, &table, &wood, "4");

        delete_product(&conn, table.id).unwrap();

        assert!(list_requirements(&conn).unwrap().is_empty());
        delete_raw_material(&conn, wood.id).unwrap();
    }

    #[test]
    fn raw_material_in_use_cannot_be_deleted() {
        let conn = open();
        let table = create_product(&conn, &new_product("P001", "Table", "10")).unwrap();
        let wood = create_raw_material(&conn, &new_material("RM001", "Wood", "20")).unwrap();
        let req = link(&conn, &table, &wood, "4");

        let err = delete_raw_material(&conn, wood.id).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));

        delete_requirement(&conn, req.id).unwrap();
        delete_raw_material(&conn, wood.id).unwrap();
        assert!(list_raw_materials(&conn).unwrap().is_empty());
    }

    #[test]
    fn priority_listing_orders_numerically() {
        let conn = open();
        // Text ordering would put "9.00" above "10.00".
        create_product(&conn, &new_product("A", "Alpha", "9")).unwrap();
        create_product(&conn, &new_product("B", "Beta", "10")).unwrap();
        create_product(&conn, &new_product("C", "Aardvark", "10")).unwrap();

        let codes: Vec<String> = list_products_by_priority(&conn)
            .unwrap()
            .into_iter()
            .map(|p| p.code)
            .collect();
        assert_eq!(codes, vec!["C", "B", "A"]);
    }

    #[test]
    fn upserts_overwrite_by_code() {
        let conn = open();
        let (first, created) = upsert_raw_material(&conn, &new_material("RM001", "Steel", "5")).unwrap();
        assert!(created);
        let (second, created) = upsert_raw_material(&conn, &new_material("RM001", "Steel", "8")).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.stock_quantity, d("8"));

        let (table, _) = upsert_product(&conn, &new_product("P001", "Table", "10")).unwrap();
        let req = NewRequirement {
            product_id: table.id,
            raw_material_id: first.id,
            required_quantity: d("1"),
        };
        assert!(upsert_requirement(&conn, &req).unwrap().1);
        let (again, created) = upsert_requirement(
            &conn,
            &NewRequirement {
                required_quantity: d("3"),
                ..req
            },
        )
        .unwrap();
        assert!(!created);
        assert_eq!(again.required_quantity, d("3"));
        assert_eq!(list_requirements(&conn).unwrap().len(), 1);
    }

    #[test]
    fn snapshot_from_database_drives_the_plan() {
        let conn = open();
        let steel = create_raw_material(&conn, &new_material("RM001", "Steel", "150")).unwrap();
        let plastic = create_raw_material(&conn, &new_material("RM002", "Plastic", "100")).unwrap();
        let p2 = create_product(&conn, &new_product("P002", "Product 2", "100.00")).unwrap();
        let p1 = create_product(&conn, &new_product("P001", "Product 1", "200.00")).unwrap();
        create_product(&conn, &new_product("P003", "Unused", "999.00")).unwrap();
        link(&conn, &p1, &steel, "10");
        link(&conn, &p2, &plastic, "10");

        let snapshot = CatalogSnapshot::capture(&conn).unwrap();
        assert_eq!(snapshot.products.len(), 3);
        assert_eq!(snapshot.requirements.len(), 2);

        let plan = snapshot.compute_plan();
        assert_eq!(plan.items.len(), 2);
        assert_eq!(plan.items[0].product_code, "P001");
        assert_eq!(plan.items[0].quantity.to_string(), "15.000");
        assert_eq!(plan.items[1].product_code, "P002");
        assert_eq!(plan.items[1].quantity.to_string(), "10.000");
        assert_eq!(plan.total_value.to_string(), "4000.00");

        // The plan is a projection; stored stock does not move.
        assert_eq!(get_raw_material(&conn, steel.id).unwrap().stock_quantity, d("150"));
    }

    #[test]
    fn clear_catalog_empties_every_table() {
        let conn = open();
        let table = create_product(&conn, &new_product("P001", "Table", "10")).unwrap();
        let wood = create_raw_material(&conn, &new_material("RM001", "Wood", "20")).unwrap();
        link(&conn, &table, &wood, "4");

        clear_catalog(&conn).unwrap();

        assert!(list_products(&conn).unwrap().is_empty());
        assert!(list_raw_materials(&conn).unwrap().is_empty());
        assert!(list_requirements(&conn).unwrap().is_empty());
    }
}
