//! # Seed Data Generator
//!
//! Populates the database with a demo gym catalog for development.
//!
//! ## Usage
//! ```bash
//! # Use backoffice.toml (or defaults)
//! cargo run -p gym-db --bin seed
//!
//! # Specify config file and/or database path
//! cargo run -p gym-db --bin seed -- --config ./backoffice.toml --db ./data/gym.db
//! ```
//!
//! Stock is never written directly: every unit arrives as an ENTRY into the
//! warehouse, and part of it is moved to the gym floor with a TRANSFER, so
//! the kardex of a seeded product replays cleanly.

use std::env;
use std::path::PathBuf;

use gym_core::{Location, NewProduct, ProductCategory};
use gym_db::{init_tracing, BackOfficeConfig, Database};

const SEED_USER: &str = "seed";

/// (sku, name, category, price in cents, min stock, warehouse units, gym units)
const CATALOG: &[(&str, &str, ProductCategory, i64, i64, i64, i64)] = &[
    ("MEM-DAY", "Day Pass", ProductCategory::Membership, 8_000, 0, 0, 500),
    ("MEM-MONTH", "Monthly Membership", ProductCategory::Membership, 60_000, 0, 0, 200),
    ("MEM-YEAR", "Annual Membership", ProductCategory::Membership, 600_000, 0, 0, 50),
    ("SUP-WHEY-1KG", "Whey Protein 1kg", ProductCategory::Supplement, 89_900, 3, 20, 6),
    ("SUP-CREA-300", "Creatine 300g", ProductCategory::Supplement, 45_000, 2, 12, 4),
    ("SUP-BCAA-400", "BCAA 400g", ProductCategory::Supplement, 52_000, 2, 8, 3),
    ("BEV-WATER-1L", "Water 1L", ProductCategory::Beverage, 2_000, 12, 96, 24),
    ("BEV-ISO-600", "Isotonic Drink 600ml", ProductCategory::Beverage, 3_200, 12, 72, 24),
    ("BEV-RTD-PROT", "Protein Shake RTD", ProductCategory::Beverage, 5_500, 6, 36, 12),
    ("SNK-BAR-PNUT", "Protein Bar Peanut", ProductCategory::Snack, 3_500, 10, 60, 20),
    ("SNK-BAR-CHOC", "Protein Bar Chocolate", ProductCategory::Snack, 3_500, 10, 60, 20),
    ("APP-TEE-M", "Gym T-Shirt M", ProductCategory::Apparel, 25_000, 2, 10, 3),
    ("APP-TEE-L", "Gym T-Shirt L", ProductCategory::Apparel, 25_000, 2, 10, 3),
    ("APP-TOWEL", "Gym Towel", ProductCategory::Apparel, 12_000, 4, 20, 6),
    ("ACC-SHAKER", "Shaker 700ml", ProductCategory::Accessory, 15_000, 3, 15, 5),
    ("ACC-GLOVES", "Training Gloves", ProductCategory::Accessory, 28_000, 2, 8, 2),
    ("ACC-LOCK", "Locker Padlock", ProductCategory::Accessory, 9_000, 2, 0, 10),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Gym Back-Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: backoffice.toml)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = BackOfficeConfig::load_or_default(config_path);
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging.filter);

    println!("🌱 Gym Back-Office Seed Data Generator");
    println!("======================================");
    println!("Database: {}", config.database.path.display());
    println!();

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicate SKUs.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating catalog...");

    let products = db.products();
    let ledger = db.ledger();
    let mut created = 0;

    for &(sku, name, category, price_cents, min_stock, warehouse, gym) in CATALOG {
        let product = match products
            .create(&NewProduct {
                sku: sku.to_string(),
                name: name.to_string(),
                category,
                price_cents,
                min_stock,
            })
            .await
        {
            Ok(product) => product,
            Err(e) => {
                eprintln!("Failed to create {}: {}", sku, e);
                continue;
            }
        };

        let received = warehouse + gym;
        if received > 0 {
            ledger
                .record_entry(&product.id, Location::Warehouse, received, SEED_USER, Some("initial stock"))
                .await?;
        }
        if gym > 0 {
            ledger
                .record_transfer(&product.id, Location::Warehouse, Location::Gym, gym, SEED_USER, Some("stock floor"))
                .await?;
        }

        created += 1;
    }

    println!("✓ Created {} products", created);

    let low = db.reports().low_stock().await?;
    println!("  Low stock: {} products", low.len());

    println!();
    println!("Stock snapshot:");
    let snapshot = db.reports().stock_snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    db.close().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
