//! Production Planner
//!
//! Works out how much of each product the raw materials in stock can cover,
//! highest-value products first.

mod calculator;
mod db;
mod decimal;
mod error;
mod import;
mod models;
mod snapshot;

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use crate::decimal::Decimal;
use crate::models::{
    NewProduct, NewRawMaterial, NewRequirement, Product, ProductId, RawMaterial, RawMaterialId,
};
use crate::snapshot::CatalogSnapshot;

#[derive(Parser)]
#[command(name = "production-planner")]
#[command(about = "Production feasibility planner for raw-material constrained catalogs")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "PLANNER_DATABASE", default_value = "planner.db")]
    database: PathBuf,

    /// More log output on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Replace the catalog with a small sample workshop
    LoadSample,

    /// Import products, raw materials and requirements from .bom files
    Import {
        /// A .bom file or a directory searched recursively
        path: PathBuf,

        /// Clear the catalog before importing
        #[arg(long)]
        clear: bool,
    },

    /// Calculate the production plan for the current stock
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage products
    #[command(subcommand)]
    Product(ProductCommand),

    /// Manage raw materials and their stock
    #[command(subcommand)]
    Material(MaterialCommand),

    /// Manage how much of each raw material a product needs
    #[command(subcommand)]
    Require(RequireCommand),
}

#[derive(Subcommand)]
enum ProductCommand {
    /// List all products
    List,
    /// Show a product and its raw materials
    Show { code: String },
    /// Add a product
    Add {
        code: String,
        name: String,
        /// Value of one unit
        value: Decimal,
    },
    /// Change a product
    Update {
        code: String,
        #[arg(long = "code")]
        new_code: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        value: Option<Decimal>,
    },
    /// Remove a product and its requirements
    Remove { code: String },
}

#[derive(Subcommand)]
enum MaterialCommand {
    /// List all raw materials
    List,
    /// Show a raw material and the products that need it
    Show { code: String },
    /// Add a raw material
    Add {
        code: String,
        name: String,
        /// Quantity in stock
        stock: Decimal,
    },
    /// Change a raw material
    Update {
        code: String,
        #[arg(long = "code")]
        new_code: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        stock: Option<Decimal>,
    },
    /// Remove a raw material no product needs
    Remove { code: String },
}

#[derive(Subcommand)]
enum RequireCommand {
    /// Set how much of a raw material one unit of a product needs
    Set {
        product: String,
        material: String,
        quantity: Decimal,
    },
    /// Remove a raw material from a product
    Unset { product: String, material: String },
    /// List requirements
    List {
        #[arg(long)]
        product: Option<String>,
        #[arg(long)]
        material: Option<String>,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::Import { path, clear } => {
            let stats = import::import_catalog(&conn, &path, clear)?;
            println!("{}", stats);
        }

        Commands::Plan { json } => {
            let snapshot = CatalogSnapshot::capture(&conn)?;
            let plan = snapshot.compute_plan();
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print!("{}", calculator::format_plan(&plan));
            }
        }

        Commands::Product(cmd) => run_product(&conn, cmd)?,
        Commands::Material(cmd) => run_material(&conn, cmd)?,
        Commands::Require(cmd) => run_require(&conn, cmd)?,
    }

    Ok(())
}

fn product_by_code(conn: &Connection, code: &str) -> Result<Product> {
    match db::find_product_by_code(conn, code)? {
        Some(product) => Ok(product),
        None => bail!("Product '{}' not found", code),
    }
}

fn material_by_code(conn: &Connection, code: &str) -> Result<RawMaterial> {
    match db::find_raw_material_by_code(conn, code)? {
        Some(material) => Ok(material),
        None => bail!("Raw material '{}' not found", code),
    }
}

fn run_product(conn: &Connection, cmd: ProductCommand) -> Result<()> {
    match cmd {
        ProductCommand::List => {
            let products = db::list_products(conn)?;
            if products.is_empty() {
                println!("No products in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<12} {:<30} {:>12}", "Code", "Product", "Unit value");
                println!("{}", "-".repeat(56));
                for p in products {
                    println!("{:<12} {:<30} {:>12}", p.code, p.name, p.unit_value.to_string());
                }
            }
        }

        ProductCommand::Show { code } => {
            let product = product_by_code(conn, &code)?;
            println!("Product: {}", product.name);
            println!("  Code: {}", product.code);
            println!("  Unit value: {}", product.unit_value);

            let reqs = db::list_requirements_for_product(conn, product.id)?;
            if reqs.is_empty() {
                println!("  No raw materials configured (never producible)");
            } else {
                println!("  Raw materials per unit:");
                for req in reqs {
                    let material = db::get_raw_material(conn, req.raw_material_id)?;
                    println!(
                        "    {} ({}) x {}",
                        material.code, material.name, req.required_quantity
                    );
                }
            }
        }

        ProductCommand::Add { code, name, value } => {
            let product = db::create_product(
                conn,
                &NewProduct {
                    code,
                    name,
                    unit_value: value,
                },
            )?;
            println!("Added product {} ({})", product.code, product.name);
        }

        ProductCommand::Update {
            code,
            new_code,
            name,
            value,
        } => {
            let current = product_by_code(conn, &code)?;
            let product = db::update_product(
                conn,
                current.id,
                &NewProduct {
                    code: new_code.unwrap_or(current.code),
                    name: name.unwrap_or(current.name),
                    unit_value: value.unwrap_or(current.unit_value),
                },
            )?;
            println!("Updated product {} ({})", product.code, product.name);
        }

        ProductCommand::Remove { code } => {
            let product = product_by_code(conn, &code)?;
            db::delete_product(conn, product.id)?;
            println!("Removed product {}", product.code);
        }
    }
    Ok(())
}

fn run_material(conn: &Connection, cmd: MaterialCommand) -> Result<()> {
    match cmd {
        MaterialCommand::List => {
            let materials = db::list_raw_materials(conn)?;
            if materials.is_empty() {
                println!("No raw materials in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<12} {:<30} {:>12}", "Code", "Raw material", "Stock");
                println!("{}", "-".repeat(56));
                for m in materials {
                    println!(
                        "{:<12} {:<30} {:>12}",
                        m.code,
                        m.name,
                        m.stock_quantity.to_string()
                    );
                }
            }
        }

        MaterialCommand::Show { code } => {
            let material = material_by_code(conn, &code)?;
            println!("Raw material: {}", material.name);
            println!("  Code: {}", material.code);
            println!("  Stock: {}", material.stock_quantity);

            let reqs = db::list_requirements_for_raw_material(conn, material.id)?;
            if !reqs.is_empty() {
                println!("  Needed by:");
                for req in reqs {
                    let product = db::get_product(conn, req.product_id)?;
                    println!(
                        "    {} ({}) x {} per unit",
                        product.code, product.name, req.required_quantity
                    );
                }
            }
        }

        MaterialCommand::Add { code, name, stock } => {
            let material = db::create_raw_material(
                conn,
                &NewRawMaterial {
                    code,
                    name,
                    stock_quantity: stock,
                },
            )?;
            println!("Added raw material {} ({})", material.code, material.name);
        }

        MaterialCommand::Update {
            code,
            new_code,
            name,
            stock,
        } => {
            let current = material_by_code(conn, &code)?;
            let material = db::update_raw_material(
                conn,
                current.id,
                &NewRawMaterial {
                    code: new_code.unwrap_or(current.code),
                    name: name.unwrap_or(current.name),
                    stock_quantity: stock.unwrap_or(current.stock_quantity),
                },
            )?;
            println!(
                "Updated raw material {} (stock {})",
                material.code, material.stock_quantity
            );
        }

        MaterialCommand::Remove { code } => {
            let material = material_by_code(conn, &code)?;
            db::delete_raw_material(conn, material.id)?;
            println!("Removed raw material {}", material.code);
        }
    }
    Ok(())
}

fn run_require(conn: &Connection, cmd: RequireCommand) -> Result<()> {
    match cmd {
        RequireCommand::Set {
            product,
            material,
            quantity,
        } => {
            let product = product_by_code(conn, &product)?;
            let material = material_by_code(conn, &material)?;
            let (req, created) = db::upsert_requirement(
                conn,
                &NewRequirement {
                    product_id: product.id,
                    raw_material_id: material.id,
                    required_quantity: quantity,
                },
            )?;
            let verb = if created { "Added" } else { "Updated" };
            println!(
                "{} requirement: {} needs {} x {}",
                verb, product.code, material.code, req.required_quantity
            );
        }

        RequireCommand::Unset { product, material } => {
            let product = product_by_code(conn, &product)?;
            let material = material_by_code(conn, &material)?;
            match db::find_requirement(conn, product.id, material.id)? {
                Some(req) => {
                    db::delete_requirement(conn, req.id)?;
                    println!("{} no longer needs {}", product.code, material.code);
                }
                None => bail!("{} does not require {}", product.code, material.code),
            }
        }

        RequireCommand::List { product, material } => {
            let reqs = match (product, material) {
                (Some(p), _) => {
                    let product = product_by_code(conn, &p)?;
                    db::list_requirements_for_product(conn, product.id)?
                }
                (None, Some(m)) => {
                    let material = material_by_code(conn, &m)?;
                    db::list_requirements_for_raw_material(conn, material.id)?
                }
                (None, None) => db::list_requirements(conn)?,
            };

            if reqs.is_empty() {
                println!("No requirements found.");
                return Ok(());
            }

            let products: HashMap<ProductId, Product> = db::list_products(conn)?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();
            let materials: HashMap<RawMaterialId, RawMaterial> = db::list_raw_materials(conn)?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();

            println!("{:<12} {:<12} {:>12}", "Product", "Material", "Per unit");
            println!("{}", "-".repeat(38));
            for req in reqs {
                let product = products
                    .get(&req.product_id)
                    .map_or("?", |p| p.code.as_str());
                let material = materials
                    .get(&req.raw_material_id)
                    .map_or("?", |m| m.code.as_str());
                println!(
                    "{:<12} {:<12} {:>12}",
                    product,
                    material,
                    req.required_quantity.to_string()
                );
            }
        }
    }
    Ok(())
}

/// Load a small furniture workshop catalog for trying the planner out
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_catalog(conn)?;

    let materials = [
        ("WOOD", "Oak board", "120.000"),
        ("STEEL", "Steel tube", "80.000"),
        ("FABRIC", "Upholstery fabric", "45.500"),
        ("SCREW", "Wood screw box", "30.000"),
        ("GLASS", "Tempered glass pane", "6.000"),
    ];
    let mut material_ids = HashMap::new();
    for (code, name, stock) in materials {
        let material = db::create_raw_material(
            conn,
            &NewRawMaterial {
                code: code.to_string(),
                name: name.to_string(),
                stock_quantity: stock.parse()?,
            },
        )?;
        material_ids.insert(code, material.id);
    }

    let products: [(&str, &str, &str, &[(&str, &str)]); 5] = [
        (
            "TBL-01",
            "Dining table",
            "450.00",
            &[("WOOD", "12.5"), ("SCREW", "1.5")],
        ),
        (
            "TBL-02",
            "Glass coffee table",
            "320.00",
            &[("STEEL", "6"), ("GLASS", "1"), ("SCREW", "0.5")],
        ),
        (
            "CHR-01",
            "Upholstered chair",
            "180.00",
            &[("WOOD", "4"), ("FABRIC", "2.25"), ("SCREW", "0.75")],
        ),
        (
            "STL-01",
            "Bar stool",
            "95.00",
            &[("STEEL", "3.5"), ("FABRIC", "0.8")],
        ),
        ("SHF-01", "Wall shelf", "60.00", &[]),
    ];
    for (code, name, value, bom) in products {
        let product = db::create_product(
            conn,
            &NewProduct {
                code: code.to_string(),
                name: name.to_string(),
                unit_value: value.parse()?,
            },
        )?;
        for (material, quantity) in bom {
            let raw_material_id = *material_ids
                .get(material)
                .with_context(|| format!("sample refers to unknown material {material}"))?;
            db::create_requirement(
                conn,
                &NewRequirement {
                    product_id: product.id,
                    raw_material_id,
                    required_quantity: quantity.parse()?,
                },
            )?;
        }
    }

    println!(
        "Loaded {} sample raw materials and {} products",
        materials.len(),
        products.len()
    );
    Ok(())
}
