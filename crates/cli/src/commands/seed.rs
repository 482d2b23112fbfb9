//! Seed the catalog with demo products.
//!
//! Reads products from a YAML file, validates them, and inserts every
//! product whose name is not already in the catalog.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use fakeshion_core::NewProduct;
use fakeshion_server::db::{self, PgStore, ProductRepository};

use super::migrate::database_url;

/// Top-level layout of the seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    pub products: Vec<NewProduct>,
}

/// Collect every problem with the seed data before touching the database.
#[must_use]
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, product) in seed.products.iter().enumerate() {
        let label = if product.name.trim().is_empty() {
            errors.push(format!("product #{i}: name is empty"));
            format!("#{i}")
        } else {
            product.name.clone()
        };
        if product.variants.is_empty() {
            errors.push(format!("{label}: no variants"));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("{label}: negative price"));
        }
        if product.variants.iter().any(|v| v.stock < 0) {
            errors.push(format!("{label}: negative stock"));
        }
    }
    errors
}

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns an error if environment variables are missing, the file cannot be
/// read or fails validation, or database operations fail.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = database_url()?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");
    let store = PgStore::new(pool);

    let mut inserted = 0_usize;
    let mut skipped = 0_usize;
    for product in &seed.products {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE name = $1)")
            .bind(&product.name)
            .fetch_one(store.pool())
            .await?;
        if exists {
            skipped += 1;
            continue;
        }
        let created = store.create_product(product).await?;
        info!(product = %created.id, name = %created.name, "Inserted product");
        inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (already exist): {skipped}");
    Ok(())
}
