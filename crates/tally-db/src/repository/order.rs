//! # Order Repository
//!
//! Persistence for the order aggregate: the order row, its line items and
//! their snapshotted variations, and its immutable payment facts.
//!
//! ## Aggregate Shape
//! ```text
//! orders 1 ──── n order_items 1 ──── n order_item_variations
//!        1 ──── n payments
//! ```
//!
//! Line items are written with frozen `snap_*` pricing; this layer never
//! consults the catalog. Payments are append-only — there is deliberately
//! no update or delete here.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tally_core::totals::Totals;
use tally_core::{
    Order, OrderDetail, OrderItem, OrderItemDetail, OrderItemVariation, OrderStatus, Payment,
};

use crate::error::DbResult;

/// Order aggregate data access. Stateless; all methods take the
/// transaction's connection.
pub struct OrderRepo;

impl OrderRepo {
    // =========================================================================
    // Order Row
    // =========================================================================

    /// Inserts a fresh order row.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, business_id, table_id, served_by, status,
                 items_total_cents, total_tax_cents, total_tip_cents,
                 manual_discount_cents, total_discount_cents, total_amount_cents,
                 created_at, updated_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.business_id)
        .bind(&order.table_id)
        .bind(&order.served_by)
        .bind(order.status)
        .bind(order.items_total_cents)
        .bind(order.total_tax_cents)
        .bind(order.total_tip_cents)
        .bind(order.manual_discount_cents)
        .bind(order.total_discount_cents)
        .bind(order.total_amount_cents)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.closed_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Fetches an order scoped by business.
    pub async fn get(
        conn: &mut SqliteConnection,
        business_id: &str,
        order_id: &str,
    ) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, business_id, table_id, served_by, status,
                   items_total_cents, total_tax_cents, total_tip_cents,
                   manual_discount_cents, total_discount_cents, total_amount_cents,
                   created_at, updated_at, closed_at
            FROM orders
            WHERE id = ? AND business_id = ?
            "#,
        )
        .bind(order_id)
        .bind(business_id)
        .fetch_optional(conn)
        .await?;

        Ok(order)
    }

    /// Finds the open order for a table, if any.
    ///
    /// Backs the one-open-order-per-table rule: creation returns this order
    /// instead of inserting a second one.
    pub async fn find_open_for_table(
        conn: &mut SqliteConnection,
        business_id: &str,
        table_id: &str,
    ) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, business_id, table_id, served_by, status,
                   items_total_cents, total_tax_cents, total_tip_cents,
                   manual_discount_cents, total_discount_cents, total_amount_cents,
                   created_at, updated_at, closed_at
            FROM orders
            WHERE business_id = ? AND table_id = ? AND status = 'open'
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(business_id)
        .bind(table_id)
        .fetch_optional(conn)
        .await?;

        Ok(order)
    }

    /// Writes the derived money columns after a recompute.
    ///
    /// `manual_discount_cents` is NOT written here — it is a manual input,
    /// owned by `set_manual_inputs`.
    pub async fn write_totals(
        conn: &mut SqliteConnection,
        order_id: &str,
        totals: &Totals,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET items_total_cents = ?,
                total_tax_cents = ?,
                total_tip_cents = ?,
                total_discount_cents = ?,
                total_amount_cents = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(totals.items_total.cents())
        .bind(totals.total_tax.cents())
        .bind(totals.total_tip.cents())
        .bind(totals.total_discount.cents())
        .bind(totals.total_amount.cents())
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Writes the staff-entered tip and manual discount.
    pub async fn set_manual_inputs(
        conn: &mut SqliteConnection,
        order_id: &str,
        tip_cents: i64,
        manual_discount_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET total_tip_cents = ?, manual_discount_cents = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(tip_cents)
        .bind(manual_discount_cents)
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Updates the serving waiter.
    pub async fn set_waiter(
        conn: &mut SqliteConnection,
        order_id: &str,
        served_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE orders SET served_by = ?, updated_at = ? WHERE id = ?")
            .bind(served_by)
            .bind(now)
            .bind(order_id)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Transitions the order's status, stamping `closed_at` on entry to a
    /// terminal status (and only once).
    pub async fn set_status(
        conn: &mut SqliteConnection,
        order_id: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let closes = !status.is_open();
        sqlx::query(
            r#"
            UPDATE orders
            SET status = ?,
                closed_at = CASE WHEN ? AND closed_at IS NULL THEN ? ELSE closed_at END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(closes)
        .bind(now)
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Line Items
    // =========================================================================

    /// Fetches all line items of an order, oldest first.
    pub async fn get_items(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, menu_item_id, snap_name, snap_base_price_cents,
                   snap_tax_rate_bps, unit_sale_price_cents, quantity, status,
                   line_total_cents, created_at
            FROM order_items
            WHERE order_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(conn)
        .await?;

        Ok(items)
    }

    /// Inserts a line item with its frozen snapshot pricing.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items
                (id, order_id, menu_item_id, snap_name, snap_base_price_cents,
                 snap_tax_rate_bps, unit_sale_price_cents, quantity, status,
                 line_total_cents, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.menu_item_id)
        .bind(&item.snap_name)
        .bind(item.snap_base_price_cents)
        .bind(item.snap_tax_rate_bps)
        .bind(item.unit_sale_price_cents)
        .bind(item.quantity)
        .bind(item.status)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Inserts a snapshotted variation row for a line item.
    pub async fn insert_variation(
        conn: &mut SqliteConnection,
        variation: &OrderItemVariation,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_item_variations
                (id, order_item_id, menu_item_variation_id,
                 snap_variation_name, snap_price_adjustment_cents)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&variation.id)
        .bind(&variation.order_item_id)
        .bind(&variation.menu_item_variation_id)
        .bind(&variation.snap_variation_name)
        .bind(variation.snap_price_adjustment_cents)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Deletes all pending line items of an order; variations cascade.
    ///
    /// Sent and voided items are untouched — only the not-yet-fulfilled part
    /// of the order is replaceable.
    pub async fn delete_pending_items(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = ? AND status = 'pending'")
            .bind(order_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Marks every pending line item as sent.
    pub async fn mark_pending_sent(conn: &mut SqliteConnection, order_id: &str) -> DbResult<u64> {
        let result =
            sqlx::query("UPDATE order_items SET status = 'sent' WHERE order_id = ? AND status = 'pending'")
                .bind(order_id)
                .execute(conn)
                .await?;

        Ok(result.rows_affected())
    }

    /// Fetches all variation rows for an order's line items.
    pub async fn get_variations_for_order(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<OrderItemVariation>> {
        let variations = sqlx::query_as::<_, OrderItemVariation>(
            r#"
            SELECT v.id, v.order_item_id, v.menu_item_variation_id,
                   v.snap_variation_name, v.snap_price_adjustment_cents
            FROM order_item_variations v
            JOIN order_items i ON i.id = v.order_item_id
            WHERE i.order_id = ?
            ORDER BY v.id
            "#,
        )
        .bind(order_id)
        .fetch_all(conn)
        .await?;

        Ok(variations)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Appends a payment fact.
    pub async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, order_id, amount_cents, method, external_reference_id,
                 is_refund, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(&payment.external_reference_id)
        .bind(payment.is_refund)
        .bind(payment.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Fetches an order's payment facts, oldest first.
    pub async fn get_payments(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, amount_cents, method, external_reference_id,
                   is_refund, created_at
            FROM payments
            WHERE order_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(conn)
        .await?;

        Ok(payments)
    }

    // =========================================================================
    // Aggregate
    // =========================================================================

    /// Assembles the full aggregate: order, items with variations, payments.
    ///
    /// Every exposed operation returns this so callers never need a separate
    /// re-fetch.
    pub async fn fetch_detail(
        conn: &mut SqliteConnection,
        business_id: &str,
        order_id: &str,
    ) -> DbResult<Option<OrderDetail>> {
        let Some(order) = Self::get(conn, business_id, order_id).await? else {
            return Ok(None);
        };

        let items = Self::get_items(conn, order_id).await?;
        let variations = Self::get_variations_for_order(conn, order_id).await?;
        let payments = Self::get_payments(conn, order_id).await?;

        let mut by_item: HashMap<String, Vec<OrderItemVariation>> = HashMap::new();
        for v in variations {
            by_item.entry(v.order_item_id.clone()).or_default().push(v);
        }

        let items = items
            .into_iter()
            .map(|item| {
                let variations = by_item.remove(&item.id).unwrap_or_default();
                OrderItemDetail { item, variations }
            })
            .collect();

        Ok(Some(OrderDetail {
            order,
            items,
            payments,
        }))
    }
}
