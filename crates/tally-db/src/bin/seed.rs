//! # Seed Data Generator
//!
//! Populates a development database with demo products and opening stock.
//!
//! ## Usage
//! ```bash
//! # Default database (./tally_dev.db) and business (demo-business)
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path and business id
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --business biz-1
//! ```
//!
//! Each product gets one opening SUPPLY ledger entry, so the stock level
//! cache starts populated and replayable.

use chrono::Utc;
use std::env;
use tally_core::{Product, StockChangeKind};
use tally_db::{Database, DbConfig, ProductRepo, StockChangeInput, StockService};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// (name, unit, opening quantity in milli-units)
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("Beef patty", "unit", 120_000),
    ("Burger bun", "unit", 120_000),
    ("Cheese slice", "unit", 200_000),
    ("Lettuce", "kg", 8_500),
    ("Tomato", "kg", 12_000),
    ("Espresso beans", "kg", 25_000),
    ("Whole milk", "l", 40_000),
    ("Oat milk", "l", 18_000),
    ("Flour", "kg", 50_000),
    ("Sunflower oil", "l", 30_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");
    let mut business_id = String::from("demo-business");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--business" | "-b" => {
                if i + 1 < args.len() {
                    business_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./tally_dev.db)");
                println!("  -b, --business <ID>    Business id to seed (default: demo-business)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Business: {}", business_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE business_id = ?")
            .bind(&business_id)
            .fetch_one(db.pool())
            .await?;
    if existing > 0 {
        println!("⚠ Business already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding products and opening stock...");

    let stock = StockService::new(db.clone());
    let now = Utc::now();

    for (name, unit, opening_milli) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.clone(),
            name: (*name).to_string(),
            unit: (*unit).to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut conn = db.pool().acquire().await?;
        ProductRepo::insert(&mut conn, &product).await?;
        drop(conn);

        let level = stock
            .record_change(StockChangeInput {
                product_id: product.id.clone(),
                business_id: business_id.clone(),
                quantity_milli: *opening_milli,
                kind: StockChangeKind::Supply,
                expiration_date: None,
                created_by: "seed".to_string(),
            })
            .await
            .map(|change| change.quantity_milli)?;

        println!(
            "  {}",
            serde_json::json!({
                "product": product.name,
                "unit": product.unit,
                "opening_milli": level,
            })
        );
    }

    println!();
    println!("✓ Seeded {} products for {}", PRODUCTS.len(), business_id);
    Ok(())
}
