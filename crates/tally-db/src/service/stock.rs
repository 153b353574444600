//! # Stock Service
//!
//! Transactional operations on the stock ledger: recording quantity deltas,
//! reversing them (singly and in bulk), and reading levels.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_change  - append a signed delta + atomically bump the level     │
//! │  reverse_change - soft-delete one entry + decrement the level           │
//! │  bulk_reverse   - all-or-nothing reversal of many entries, one level    │
//! │                   decrement per product                                  │
//! │  get_level      - current cached quantity (zero if never stocked)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Levels may go negative: stock-taking lag is normal in a kitchen, and a
//! later supply or adjustment entry corrects the cache without special
//! handling.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use tally_core::{validation, EngineError, EngineResult, StockChange, StockChangeKind, StockLevel};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbError;
use crate::pool::Database;
use crate::repository::{ProductRepo, StockRepo};

/// Input for recording one stock ledger entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StockChangeInput {
    pub product_id: String,
    pub business_id: String,
    /// Signed delta in milli-units; must be non-zero.
    pub quantity_milli: i64,
    pub kind: StockChangeKind,
    pub expiration_date: Option<NaiveDate>,
    /// Acting user, recorded for audit.
    pub created_by: String,
}

/// Stock ledger operations, one transaction per call.
#[derive(Debug, Clone)]
pub struct StockService {
    db: Database,
}

impl StockService {
    pub fn new(db: Database) -> Self {
        StockService { db }
    }

    /// Records a stock change and updates the level cache atomically.
    ///
    /// The product reference is validated (active, same business) before
    /// any write; an unknown product yields `InvalidReference`.
    pub async fn record_change(&self, input: StockChangeInput) -> EngineResult<StockChange> {
        validation::validate_id("product_id", &input.product_id)?;
        validation::validate_id("business_id", &input.business_id)?;
        validation::validate_id("created_by", &input.created_by)?;
        validation::validate_stock_delta(input.quantity_milli)?;

        let mut tx = self.db.begin().await?;
        let change = record_change_on(&mut tx, &input).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            product_id = %change.product_id,
            quantity_milli = change.quantity_milli,
            kind = ?change.kind,
            "Stock change recorded"
        );
        Ok(change)
    }

    /// Reverses a single ledger entry.
    ///
    /// The entry is soft-deleted (`deleted_at`), never removed, and the
    /// level cache drops by the entry's delta in the same transaction.
    /// Reversing an already-reversed or unknown entry is `NotFound`.
    pub async fn reverse_change(
        &self,
        business_id: &str,
        change_id: &str,
    ) -> EngineResult<StockLevel> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("change_id", change_id)?;

        let mut tx = self.db.begin().await?;

        let change = StockRepo::get_active_change(&mut tx, business_id, change_id)
            .await?
            .ok_or_else(|| EngineError::not_found("StockChange", change_id))?;

        let now = Utc::now();
        let affected = StockRepo::soft_delete(&mut tx, business_id, change_id, now).await?;
        if affected == 0 {
            return Err(EngineError::not_found("StockChange", change_id));
        }

        StockRepo::apply_level_delta(
            &mut tx,
            business_id,
            &change.product_id,
            -change.quantity_milli,
            now,
        )
        .await?;

        let level = StockRepo::get_level(&mut tx, business_id, &change.product_id)
            .await?
            .ok_or_else(|| EngineError::Storage("stock level row missing after update".into()))?;

        tx.commit().await.map_err(DbError::from)?;

        info!(change_id, product_id = %change.product_id, "Stock change reversed");
        Ok(level)
    }

    /// Reverses a batch of ledger entries, all-or-nothing.
    ///
    /// If any entry is unknown, cross-business or already reversed the whole
    /// batch fails with `Conflict` and nothing changes. Level decrements are
    /// grouped to one statement per product.
    pub async fn bulk_reverse(
        &self,
        business_id: &str,
        change_ids: &[String],
    ) -> EngineResult<Vec<StockLevel>> {
        validation::validate_id("business_id", business_id)?;
        if change_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Duplicate ids in the request would double-decrement the level.
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<&str> = change_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let mut tx = self.db.begin().await?;
        let now = Utc::now();

        let mut per_product: BTreeMap<String, i64> = BTreeMap::new();
        for &id in &unique {
            let change = StockRepo::get_active_change(&mut tx, business_id, id)
                .await?
                .ok_or_else(|| {
                    EngineError::conflict(format!(
                        "stock change {id} missing or already reversed"
                    ))
                })?;
            *per_product.entry(change.product_id.clone()).or_default() += change.quantity_milli;

            let affected = StockRepo::soft_delete(&mut tx, business_id, id, now).await?;
            if affected == 0 {
                return Err(EngineError::conflict(format!(
                    "stock change {id} missing or already reversed"
                )));
            }
        }

        let mut levels = Vec::with_capacity(per_product.len());
        for (product_id, total_milli) in &per_product {
            StockRepo::apply_level_delta(&mut tx, business_id, product_id, -total_milli, now)
                .await?;
            let level = StockRepo::get_level(&mut tx, business_id, product_id)
                .await?
                .ok_or_else(|| {
                    EngineError::Storage("stock level row missing after update".into())
                })?;
            levels.push(level);
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            reversed = unique.len(),
            products = levels.len(),
            "Bulk stock reversal committed"
        );
        Ok(levels)
    }

    /// Returns a product's current stock level.
    ///
    /// A product with no ledger history yet reads as a zero level rather
    /// than an error; an unknown product is `NotFound`.
    pub async fn get_level(&self, business_id: &str, product_id: &str) -> EngineResult<StockLevel> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("product_id", product_id)?;

        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;

        ProductRepo::get_active(&mut conn, business_id, product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        let level = StockRepo::get_level(&mut conn, business_id, product_id).await?;
        Ok(level.unwrap_or_else(|| StockLevel {
            product_id: product_id.to_string(),
            business_id: business_id.to_string(),
            quantity_milli: 0,
            updated_at: Utc::now(),
        }))
    }
}

/// Records one ledger entry on an already-open transaction.
///
/// Shared with the fulfillment pipeline, which writes usage entries inside
/// the order's own transaction.
pub(crate) async fn record_change_on(
    conn: &mut SqliteConnection,
    input: &StockChangeInput,
) -> EngineResult<StockChange> {
    ProductRepo::get_active(conn, &input.business_id, &input.product_id)
        .await?
        .ok_or_else(|| EngineError::invalid_reference("Product", input.product_id.clone()))?;

    let now = Utc::now();
    let change = StockChange {
        id: Uuid::new_v4().to_string(),
        product_id: input.product_id.clone(),
        business_id: input.business_id.clone(),
        quantity_milli: input.quantity_milli,
        kind: input.kind,
        expiration_date: input.expiration_date,
        created_by: input.created_by.clone(),
        created_at: now,
        deleted_at: None,
    };

    StockRepo::insert_change(conn, &change).await?;
    StockRepo::apply_level_delta(
        conn,
        &input.business_id,
        &input.product_id,
        input.quantity_milli,
        now,
    )
    .await?;

    debug!(
        product_id = %input.product_id,
        quantity_milli = input.quantity_milli,
        "Ledger entry appended"
    );
    Ok(change)
}

// =============================================================================
// Unit Tests
// =============================================================================
