//! # Stock Repository
//!
//! The append-only stock ledger and its derived level cache.
//!
//! ## Ledger / Cache Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock_levels.quantity_milli                                            │
//! │      == SUM(stock_changes.quantity_milli WHERE deleted_at IS NULL)      │
//! │                                                                         │
//! │  Maintained by writing both sides in the SAME transaction:              │
//! │    insert_change  +  apply_level_delta(+qty)                            │
//! │    soft_delete    +  apply_level_delta(−qty)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Level updates are single atomic SQL statements (upsert-with-add), never
//! read-modify-write in Rust, so concurrent transactions cannot lose deltas.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tally_core::{StockChange, StockLevel};

use crate::error::DbResult;

/// Stock ledger data access. Stateless; all methods take the transaction's
/// connection.
pub struct StockRepo;

impl StockRepo {
    /// Appends a ledger entry.
    pub async fn insert_change(conn: &mut SqliteConnection, change: &StockChange) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_changes
                (id, product_id, business_id, quantity_milli, kind,
                 expiration_date, created_by, created_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&change.id)
        .bind(&change.product_id)
        .bind(&change.business_id)
        .bind(change.quantity_milli)
        .bind(change.kind)
        .bind(change.expiration_date)
        .bind(&change.created_by)
        .bind(change.created_at)
        .bind(change.deleted_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Fetches a ledger entry that has not been reversed, scoped by business.
    pub async fn get_active_change(
        conn: &mut SqliteConnection,
        business_id: &str,
        change_id: &str,
    ) -> DbResult<Option<StockChange>> {
        let change = sqlx::query_as::<_, StockChange>(
            r#"
            SELECT id, product_id, business_id, quantity_milli, kind,
                   expiration_date, created_by, created_at, deleted_at
            FROM stock_changes
            WHERE id = ? AND business_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(change_id)
        .bind(business_id)
        .fetch_optional(conn)
        .await?;

        Ok(change)
    }

    /// Soft-deletes a ledger entry (marks it reversed).
    ///
    /// Returns the number of rows affected; the `deleted_at IS NULL` guard
    /// makes a double reversal affect zero rows, which callers turn into
    /// their own error.
    pub async fn soft_delete(
        conn: &mut SqliteConnection,
        business_id: &str,
        change_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE stock_changes
            SET deleted_at = ?
            WHERE id = ? AND business_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(change_id)
        .bind(business_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Adds a signed delta to a product's level, creating the row lazily.
    ///
    /// Single atomic statement: the addition happens inside SQLite, so
    /// concurrent transactions serialize on the row instead of overwriting
    /// each other's reads.
    pub async fn apply_level_delta(
        conn: &mut SqliteConnection,
        business_id: &str,
        product_id: &str,
        delta_milli: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_levels (product_id, business_id, quantity_milli, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (product_id) DO UPDATE SET
                quantity_milli = quantity_milli + excluded.quantity_milli,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(product_id)
        .bind(business_id)
        .bind(delta_milli)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Fetches a product's level row, if one has been created yet.
    pub async fn get_level(
        conn: &mut SqliteConnection,
        business_id: &str,
        product_id: &str,
    ) -> DbResult<Option<StockLevel>> {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT product_id, business_id, quantity_milli, updated_at
            FROM stock_levels
            WHERE product_id = ? AND business_id = ?
            "#,
        )
        .bind(product_id)
        .bind(business_id)
        .fetch_optional(conn)
        .await?;

        Ok(level)
    }

    /// Replays the ledger: sum of non-deleted deltas for a product.
    ///
    /// Diagnostic counterpart of the cache; equality with the level row is
    /// the ledger invariant.
    pub async fn replay_quantity(
        conn: &mut SqliteConnection,
        business_id: &str,
        product_id: &str,
    ) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity_milli), 0)
            FROM stock_changes
            WHERE product_id = ? AND business_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(product_id)
        .bind(business_id)
        .fetch_one(conn)
        .await?;

        Ok(sum)
    }
}
