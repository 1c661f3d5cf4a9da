//! Bill-of-materials file import
//!
//! Loads products, raw materials and requirements from plain-text `.bom`
//! files. Each non-blank line is one entry; `#` outside a quoted name starts
//! a comment.
//!
//! ```text
//! material RM001 "Steel" 100.000
//! product  P001  "Table" 250.00
//! requires P001  RM001   12.5
//! ```
//!
//! Entries are upserted by code, so importing the same files twice leaves the
//! catalog unchanged. Requirements are resolved after every file has been
//! read, so a requirement may refer to a product defined in another file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::decimal::{Decimal, DecimalError};
use crate::models::{NewProduct, NewRawMaterial, NewRequirement};

pub const BOM_EXTENSION: &str = "bom";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Material(NewRawMaterial),
    Product(NewProduct),
    Requires {
        product_code: String,
        material_code: String,
        quantity: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("line {line}: unrecognized entry {text:?}")]
    Unrecognized { line: usize, text: String },
    #[error("line {line}: {source}")]
    Number { line: usize, source: DecimalError },
}

struct BomParser {
    material: Regex,
    product: Regex,
    requires: Regex,
}

impl BomParser {
    fn new() -> Result<Self> {
        Ok(Self {
            material: Regex::new(r#"^material\s+(\S+)\s+"([^"]*)"\s+(\S+)$"#)?,
            product: Regex::new(r#"^product\s+(\S+)\s+"([^"]*)"\s+(\S+)$"#)?,
            requires: Regex::new(r"^requires\s+(\S+)\s+(\S+)\s+(\S+)$")?,
        })
    }

    fn parse_line(&self, line: usize, raw: &str) -> Result<Option<Entry>, LineError> {
        let text = strip_comment(raw).trim();
        if text.is_empty() {
            return Ok(None);
        }

        let number = |s: &str| {
            s.parse::<Decimal>()
                .map_err(|source| LineError::Number { line, source })
        };

        if let Some(cap) = self.material.captures(text) {
            return Ok(Some(Entry::Material(NewRawMaterial {
                code: cap[1].to_string(),
                name: cap[2].to_string(),
                stock_quantity: number(&cap[3])?,
            })));
        }
        if let Some(cap) = self.product.captures(text) {
            return Ok(Some(Entry::Product(NewProduct {
                code: cap[1].to_string(),
                name: cap[2].to_string(),
                unit_value: number(&cap[3])?,
            })));
        }
        if let Some(cap) = self.requires.captures(text) {
            return Ok(Some(Entry::Requires {
                product_code: cap[1].to_string(),
                material_code: cap[2].to_string(),
                quantity: number(&cap[3])?,
            }));
        }

        Err(LineError::Unrecognized {
            line,
            text: text.to_string(),
        })
    }

    fn parse(&self, content: &str) -> (Vec<Entry>, Vec<LineError>) {
        let mut entries = Vec::new();
        let mut errors = Vec::new();
        for (idx, raw) in content.lines().enumerate() {
            match self.parse_line(idx + 1, raw) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
        (entries, errors)
    }
}

/// The part of `raw` before the first `#` that is not inside double quotes.
fn strip_comment(raw: &str) -> &str {
    let mut quoted = false;
    for (idx, ch) in raw.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '#' if !quoted => return &raw[..idx],
            _ => {}
        }
    }
    raw
}

/// Find `.bom` files: `path` itself if it is a file, otherwise every `.bom`
/// file below it, in file-name order.
pub fn find_bom_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("{} is neither a file nor a directory", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == BOM_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Import every `.bom` file under `path` into the catalog.
///
/// With `clear` set the existing catalog is emptied first. Clearing and
/// loading share one transaction, so a failed import leaves the catalog as it
/// was.
pub fn import_catalog(conn: &Connection, path: &Path, clear: bool) -> Result<ImportStats> {
    let parser = BomParser::new()?;
    let mut stats = ImportStats::default();

    let files = find_bom_files(path)?;
    info!(path = %path.display(), files = files.len(), "importing catalog");

    let tx = conn.unchecked_transaction()?;
    if clear {
        db::clear_catalog(&tx)?;
        info!("cleared existing catalog");
    }
    let mut pending = Vec::new();

    for file in &files {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let (entries, errors) = parser.parse(&content);
        stats.files += 1;

        for e in &errors {
            warn!(file = %file.display(), "{e}");
        }
        stats.errors += errors.len();

        if entries.is_empty() {
            stats.skipped += 1;
            continue;
        }

        for entry in entries {
            let outcome = match entry {
                Entry::Material(input) => db::upsert_raw_material(&tx, &input).map(|_| {
                    stats.materials += 1;
                }),
                Entry::Product(input) => db::upsert_product(&tx, &input).map(|_| {
                    stats.products += 1;
                }),
                requires @ Entry::Requires { .. } => {
                    pending.push((file.clone(), requires));
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                warn!(file = %file.display(), "rejected entry: {e}");
                stats.errors += 1;
            }
        }
    }

    for (file, entry) in pending {
        let Entry::Requires {
            product_code,
            material_code,
            quantity,
        } = entry
        else {
            continue;
        };

        let product = db::find_product_by_code(&tx, &product_code)?;
        let material = db::find_raw_material_by_code(&tx, &material_code)?;
        let (Some(product), Some(material)) = (product, material) else {
            warn!(
                file = %file.display(),
                product = %product_code,
                raw_material = %material_code,
                "requirement refers to an unknown code"
            );
            stats.errors += 1;
            continue;
        };

        let input = NewRequirement {
            product_id: product.id,
            raw_material_id: material.id,
            required_quantity: quantity,
        };
        match db::upsert_requirement(&tx, &input) {
            Ok(_) => stats.requirements += 1,
            Err(e) => {
                warn!(file = %file.display(), "rejected requirement: {e}");
                stats.errors += 1;
            }
        }
    }

    tx.commit()?;
    Ok(stats)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub files: usize,
    pub materials: usize,
    pub products: usize,
    pub requirements: usize,
    /// Files without a single usable entry.
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} files ({} raw materials, {} products, {} requirements). Skipped: {}, Errors: {}",
            self.files, self.materials, self.products, self.requirements, self.skipped, self.errors
        )
    }
}
