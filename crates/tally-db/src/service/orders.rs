//! # Order Service
//!
//! Order lifecycle: creation, item updates with snapshot pricing, manual
//! totals inputs, waiter assignment, fulfillment and cancellation.
//!
//! ## Fulfillment Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  send_pending_items                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pending line items ──► recipes (catalog) ──► net quantity per product  │
//! │       │                                              │                  │
//! │       ▼                                              ▼                  │
//! │  mark items SENT                        one USAGE ledger entry each     │
//! │       │                                              │                  │
//! │       └──────────────── same transaction ────────────┘                  │
//! │                                                                         │
//! │  Sent items are immutable; re-sending with nothing pending is a no-op,  │
//! │  so stock is deducted exactly once per line item.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use tally_core::catalog::{Catalog, DiscountCalculator};
use tally_core::totals;
use tally_core::{
    validation, EngineError, EngineResult, Money, Order, OrderDetail, OrderItem, OrderItemStatus,
    OrderItemVariation, OrderStatus, StockChangeKind,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbError;
use crate::pool::Database;
use crate::repository::OrderRepo;
use crate::service::stock::{record_change_on, StockChangeInput};

/// One requested line item: a menu item reference, a quantity, and the
/// variations applied to it. Pricing is resolved and frozen server-side.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub menu_item_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub variation_ids: Vec<String>,
}

/// Order operations, one transaction per call.
///
/// The catalog and discount rules are injected: the engine validates
/// references against them and freezes their pricing into snapshots, but
/// never owns menu data.
#[derive(Debug, Clone)]
pub struct OrderService<C: Catalog, D: DiscountCalculator> {
    db: Database,
    catalog: C,
    discounts: D,
}

impl<C: Catalog, D: DiscountCalculator> OrderService<C, D> {
    pub fn new(db: Database, catalog: C, discounts: D) -> Self {
        OrderService {
            db,
            catalog,
            discounts,
        }
    }

    // =========================================================================
    // Creation & Lookup
    // =========================================================================

    /// Creates an order, or returns the existing open one for the table.
    ///
    /// At most one open order exists per `(business, table)`; a second
    /// create for the same table is coerced into returning the first order
    /// instead of failing. Counter orders (`table_id = None`) always create
    /// a fresh order.
    pub async fn create_for_table(
        &self,
        business_id: &str,
        table_id: Option<&str>,
    ) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", business_id)?;
        if let Some(table) = table_id {
            validation::validate_id("table_id", table)?;
        }

        let mut tx = self.db.begin().await?;

        if let Some(table) = table_id {
            if let Some(existing) = OrderRepo::find_open_for_table(&mut tx, business_id, table).await?
            {
                debug!(order_id = %existing.id, table_id = table, "Reusing open table order");
                let detail = fetch_detail_required(&mut tx, business_id, &existing.id).await?;
                tx.commit().await.map_err(DbError::from)?;
                return Ok(detail);
            }
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            table_id: table_id.map(String::from),
            served_by: None,
            status: OrderStatus::Open,
            items_total_cents: 0,
            total_tax_cents: 0,
            total_tip_cents: 0,
            manual_discount_cents: 0,
            total_discount_cents: 0,
            total_amount_cents: 0,
            created_at: now,
            updated_at: now,
            closed_at: None,
        };
        OrderRepo::insert(&mut tx, &order).await?;

        let detail = fetch_detail_required(&mut tx, business_id, &order.id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(order_id = %order.id, table_id = ?table_id, "Order created");
        Ok(detail)
    }

    /// Fetches the full order aggregate.
    pub async fn get_order(&self, business_id: &str, order_id: &str) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("order_id", order_id)?;

        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        OrderRepo::fetch_detail(&mut conn, business_id, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))
    }

    // =========================================================================
    // Item Updates
    // =========================================================================

    /// Replaces the order's pending line items with the requested set.
    ///
    /// Each menu item reference is resolved against the catalog and its
    /// pricing frozen into `snap_*` columns: unknown or disabled menu items
    /// are `InvalidReference`, disabled variations are silently dropped.
    /// Sent items are untouched. Totals are recomputed before returning.
    pub async fn update_items(
        &self,
        business_id: &str,
        order_id: &str,
        inputs: &[OrderItemInput],
    ) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("order_id", order_id)?;
        for input in inputs {
            validation::validate_id("menu_item_id", &input.menu_item_id)?;
            validation::validate_item_quantity(input.quantity)?;
        }

        let mut tx = self.db.begin().await?;
        let order = load_open_order(&mut tx, business_id, order_id).await?;

        // Resolve every reference before the first write, so a bad input
        // leaves the order untouched.
        let now = Utc::now();
        let mut resolved: Vec<(OrderItem, Vec<OrderItemVariation>)> = Vec::new();
        for input in inputs {
            let snapshot = self
                .catalog
                .menu_item(business_id, &input.menu_item_id)
                .filter(|m| !m.disabled)
                .ok_or_else(|| {
                    EngineError::invalid_reference("MenuItem", input.menu_item_id.clone())
                })?;

            let item_id = Uuid::new_v4().to_string();
            let mut variations = Vec::new();
            let mut adjustment_cents = 0i64;
            for variation_id in &input.variation_ids {
                let v = self
                    .catalog
                    .variation(business_id, variation_id)
                    .ok_or_else(|| {
                        EngineError::invalid_reference(
                            "MenuItemVariation",
                            variation_id.clone(),
                        )
                    })?;
                if v.disabled {
                    continue;
                }
                adjustment_cents += v.price_adjustment_cents;
                variations.push(OrderItemVariation {
                    id: Uuid::new_v4().to_string(),
                    order_item_id: item_id.clone(),
                    menu_item_variation_id: v.id,
                    snap_variation_name: v.name,
                    snap_price_adjustment_cents: v.price_adjustment_cents,
                });
            }

            let unit_sale_price = Money::from_cents(snapshot.base_price_cents + adjustment_cents);
            let line_total = unit_sale_price.multiply_quantity(input.quantity);
            resolved.push((
                OrderItem {
                    id: item_id,
                    order_id: order_id.to_string(),
                    menu_item_id: input.menu_item_id.clone(),
                    snap_name: snapshot.name,
                    snap_base_price_cents: snapshot.base_price_cents,
                    snap_tax_rate_bps: snapshot.tax_rate_bps,
                    unit_sale_price_cents: unit_sale_price.cents(),
                    quantity: input.quantity,
                    status: OrderItemStatus::Pending,
                    line_total_cents: line_total.cents(),
                    created_at: now,
                },
                variations,
            ));
        }

        OrderRepo::delete_pending_items(&mut tx, order_id).await?;
        for (item, variations) in &resolved {
            OrderRepo::insert_item(&mut tx, item).await?;
            for variation in variations {
                OrderRepo::insert_variation(&mut tx, variation).await?;
            }
        }

        self.recompute(&mut tx, &order).await?;

        let detail = fetch_detail_required(&mut tx, business_id, order_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        debug!(order_id, lines = resolved.len(), "Pending items replaced");
        Ok(detail)
    }

    // =========================================================================
    // Manual Inputs
    // =========================================================================

    /// Sets the staff-entered tip and manual discount, then recomputes.
    pub async fn update_totals(
        &self,
        business_id: &str,
        order_id: &str,
        tip_cents: i64,
        manual_discount_cents: i64,
    ) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("order_id", order_id)?;
        validation::validate_non_negative("tip", tip_cents)?;
        validation::validate_non_negative("discount", manual_discount_cents)?;

        let mut tx = self.db.begin().await?;
        let mut order = load_open_order(&mut tx, business_id, order_id).await?;

        let now = Utc::now();
        OrderRepo::set_manual_inputs(&mut tx, order_id, tip_cents, manual_discount_cents, now)
            .await?;
        order.total_tip_cents = tip_cents;
        order.manual_discount_cents = manual_discount_cents;

        self.recompute(&mut tx, &order).await?;

        let detail = fetch_detail_required(&mut tx, business_id, order_id).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(detail)
    }

    /// Reassigns the serving waiter.
    pub async fn update_waiter(
        &self,
        business_id: &str,
        order_id: &str,
        served_by: Option<&str>,
    ) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("order_id", order_id)?;
        if let Some(user) = served_by {
            validation::validate_id("served_by", user)?;
        }

        let mut tx = self.db.begin().await?;
        load_open_order(&mut tx, business_id, order_id).await?;

        OrderRepo::set_waiter(&mut tx, order_id, served_by, Utc::now()).await?;

        let detail = fetch_detail_required(&mut tx, business_id, order_id).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(detail)
    }

    // =========================================================================
    // Fulfillment
    // =========================================================================

    /// Sends every pending line item to fulfillment, deducting stock.
    ///
    /// Recipe quantities are netted across the whole batch and written as
    /// one negative USAGE ledger entry per product, inside the order's own
    /// transaction. With nothing pending this is a no-op, which makes the
    /// operation idempotent: stock is deducted exactly once per item.
    pub async fn send_pending_items(
        &self,
        business_id: &str,
        order_id: &str,
        actor: &str,
    ) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("order_id", order_id)?;
        validation::validate_id("actor", actor)?;

        let mut tx = self.db.begin().await?;
        let order = load_open_order(&mut tx, business_id, order_id).await?;

        let items = OrderRepo::get_items(&mut tx, order_id).await?;
        let pending: Vec<&OrderItem> = items
            .iter()
            .filter(|i| i.status == OrderItemStatus::Pending)
            .collect();

        if pending.is_empty() {
            let detail = fetch_detail_required(&mut tx, business_id, order_id).await?;
            tx.commit().await.map_err(DbError::from)?;
            return Ok(detail);
        }

        // Net recipe consumption across the batch: two burgers and a
        // cheeseburger become ONE ledger entry per ingredient.
        let variations = OrderRepo::get_variations_for_order(&mut tx, order_id).await?;
        let mut consumption: BTreeMap<String, i64> = BTreeMap::new();
        for item in &pending {
            // Menu items deleted since add-time simply have no recipe left
            // to consume; the sale itself still goes through.
            if let Some(snapshot) = self.catalog.menu_item(business_id, &item.menu_item_id) {
                for line in &snapshot.recipe {
                    *consumption.entry(line.product_id.clone()).or_default() +=
                        line.quantity_milli * item.quantity;
                }
            }
            for v in variations.iter().filter(|v| v.order_item_id == item.id) {
                if let Some(vs) = self.catalog.variation(business_id, &v.menu_item_variation_id) {
                    for line in &vs.addon_recipe {
                        *consumption.entry(line.product_id.clone()).or_default() +=
                            line.quantity_milli * item.quantity;
                    }
                }
            }
        }

        let sent = OrderRepo::mark_pending_sent(&mut tx, order_id).await?;

        for (product_id, quantity_milli) in &consumption {
            if *quantity_milli == 0 {
                continue;
            }
            record_change_on(
                &mut tx,
                &StockChangeInput {
                    product_id: product_id.clone(),
                    business_id: business_id.to_string(),
                    quantity_milli: -quantity_milli,
                    kind: StockChangeKind::Usage,
                    expiration_date: None,
                    created_by: actor.to_string(),
                },
            )
            .await?;
        }

        self.recompute(&mut tx, &order).await?;

        let detail = fetch_detail_required(&mut tx, business_id, order_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id,
            items_sent = sent,
            products_deducted = consumption.len(),
            "Pending items sent"
        );
        Ok(detail)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels an open order.
    ///
    /// Only legal while no (non-refund) payment exists; paid-for orders go
    /// through the refund flow instead.
    pub async fn cancel(&self, business_id: &str, order_id: &str) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("order_id", order_id)?;

        let mut tx = self.db.begin().await?;
        load_open_order(&mut tx, business_id, order_id).await?;

        let payments = OrderRepo::get_payments(&mut tx, order_id).await?;
        if payments.iter().any(|p| !p.is_refund) {
            return Err(EngineError::invalid_state(
                "order has payments and cannot be cancelled; refund it instead",
            ));
        }

        OrderRepo::set_status(&mut tx, order_id, OrderStatus::Cancelled, Utc::now()).await?;

        let detail = fetch_detail_required(&mut tx, business_id, order_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(order_id, "Order cancelled");
        Ok(detail)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Recomputes the derived money columns from current line items.
    ///
    /// The combined discount is the manual discount plus whatever the
    /// injected discount rules grant for the current item set.
    async fn recompute(&self, conn: &mut SqliteConnection, order: &Order) -> EngineResult<()> {
        let items = OrderRepo::get_items(conn, &order.id).await?;
        let auto_cents = self.discounts.discount_for(&order.business_id, &items).max(0);
        let discount = Money::from_cents(order.manual_discount_cents.saturating_add(auto_cents));

        let totals = totals::compute(&items, Money::from_cents(order.total_tip_cents), discount);
        OrderRepo::write_totals(conn, &order.id, &totals, Utc::now()).await?;
        Ok(())
    }
}

/// Loads an order that must exist and still be open.
pub(crate) async fn load_open_order(
    conn: &mut SqliteConnection,
    business_id: &str,
    order_id: &str,
) -> EngineResult<Order> {
    let order = OrderRepo::get(conn, business_id, order_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Order", order_id))?;

    if !order.status.is_open() {
        return Err(EngineError::invalid_state(format!(
            "order is {:?}, expected open",
            order.status
        )));
    }
    Ok(order)
}

/// Fetches the aggregate for an order known to exist in this transaction.
pub(crate) async fn fetch_detail_required(
    conn: &mut SqliteConnection,
    business_id: &str,
    order_id: &str,
) -> EngineResult<OrderDetail> {
    OrderRepo::fetch_detail(conn, business_id, order_id)
        .await?
        .ok_or_else(|| EngineError::Storage(format!("order {order_id} vanished mid-transaction")))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::StockService;
    use crate::testutil::{demo_catalog, seed_demo_products, test_db};
    use tally_core::catalog::NoAutoDiscount;
    use tally_core::{OrderItem, PaymentMethod};

    async fn service(
        db: &Database,
    ) -> OrderService<tally_core::catalog::InMemoryCatalog, NoAutoDiscount> {
        seed_demo_products(db, "b1").await;
        OrderService::new(db.clone(), demo_catalog("b1"), NoAutoDiscount)
    }

    fn burger(quantity: i64, variation_ids: &[&str]) -> OrderItemInput {
        OrderItemInput {
            menu_item_id: "burger".into(),
            quantity,
            variation_ids: variation_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_for_table_is_idempotent() {
        let db = test_db().await;
        let orders = service(&db).await;

        let first = orders.create_for_table("b1", Some("t1")).await.unwrap();
        let second = orders.create_for_table("b1", Some("t1")).await.unwrap();
        assert_eq!(first.order.id, second.order.id);

        // A different table gets its own order.
        let other = orders.create_for_table("b1", Some("t2")).await.unwrap();
        assert_ne!(first.order.id, other.order.id);
    }

    #[tokio::test]
    async fn test_counter_orders_always_fresh() {
        let db = test_db().await;
        let orders = service(&db).await;

        let a = orders.create_for_table("b1", None).await.unwrap();
        let b = orders.create_for_table("b1", None).await.unwrap();
        assert_ne!(a.order.id, b.order.id);
    }

    /// Base 10.00, +2.00 cheese, quantity 2 → line 24.00; 10% category tax
    /// → 2.40; total 26.40.
    #[tokio::test]
    async fn test_update_items_snapshot_pricing_and_totals() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        let detail = orders
            .update_items("b1", &order.order.id, &[burger(2, &["cheese"])])
            .await
            .unwrap();

        assert_eq!(detail.items.len(), 1);
        let line = &detail.items[0];
        assert_eq!(line.item.snap_name, "Burger");
        assert_eq!(line.item.snap_base_price_cents, 1000);
        assert_eq!(line.item.unit_sale_price_cents, 1200);
        assert_eq!(line.item.line_total_cents, 2400);
        assert_eq!(line.variations.len(), 1);
        assert_eq!(line.variations[0].snap_price_adjustment_cents, 200);

        assert_eq!(detail.order.items_total_cents, 2400);
        assert_eq!(detail.order.total_tax_cents, 240);
        assert_eq!(detail.order.total_amount_cents, 2640);
    }

    #[tokio::test]
    async fn test_update_items_replaces_pending_only() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        orders
            .update_items("b1", &order.order.id, &[burger(1, &[])])
            .await
            .unwrap();
        orders
            .send_pending_items("b1", &order.order.id, "user-1")
            .await
            .unwrap();

        // Second update adds a new pending line; the sent one survives.
        let detail = orders
            .update_items("b1", &order.order.id, &[burger(2, &["cheese"])])
            .await
            .unwrap();
        assert_eq!(detail.items.len(), 2);

        let sent: Vec<&OrderItem> = detail
            .items
            .iter()
            .map(|i| &i.item)
            .filter(|i| i.status == OrderItemStatus::Sent)
            .collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].line_total_cents, 1000);

        // Totals cover both lines: 1000 + 2400 items, 10% tax on each.
        assert_eq!(detail.order.items_total_cents, 3400);
        assert_eq!(detail.order.total_amount_cents, 3400 + 340);
    }

    #[tokio::test]
    async fn test_unknown_menu_item_rejected_without_writes() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        orders
            .update_items("b1", &order.order.id, &[burger(1, &[])])
            .await
            .unwrap();

        let err = orders
            .update_items(
                "b1",
                &order.order.id,
                &[
                    burger(2, &[]),
                    OrderItemInput {
                        menu_item_id: "ghost".into(),
                        quantity: 1,
                        variation_ids: vec![],
                    },
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_reference");

        // Original pending line untouched.
        let detail = orders.get_order("b1", &order.order.id).await.unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].item.quantity, 1);
    }

    #[tokio::test]
    async fn test_disabled_variation_silently_dropped() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        let detail = orders
            .update_items("b1", &order.order.id, &[burger(1, &["cheese", "truffle"])])
            .await
            .unwrap();

        // "truffle" is disabled: price and variations exclude it.
        assert_eq!(detail.items[0].item.unit_sale_price_cents, 1200);
        assert_eq!(detail.items[0].variations.len(), 1);
    }

    #[tokio::test]
    async fn test_send_deducts_netted_stock_once() {
        let db = test_db().await;
        let orders = service(&db).await;
        let stock = StockService::new(db.clone());

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        // 2 cheeseburgers + 1 plain burger: 3 patties, 3 buns, 2 cheese.
        orders
            .update_items(
                "b1",
                &order.order.id,
                &[burger(2, &["cheese"]), burger(1, &[])],
            )
            .await
            .unwrap();
        orders
            .send_pending_items("b1", &order.order.id, "user-1")
            .await
            .unwrap();

        assert_eq!(stock.get_level("b1", "patty").await.unwrap().quantity_milli, -3000);
        assert_eq!(stock.get_level("b1", "bun").await.unwrap().quantity_milli, -3000);
        assert_eq!(stock.get_level("b1", "cheese-slice").await.unwrap().quantity_milli, -2000);

        // One netted USAGE entry per product, not one per line item.
        let mut conn = db.pool().acquire().await.unwrap();
        let entries: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_changes WHERE business_id = 'b1'",
        )
        .fetch_one(&mut *conn)
        .await
        .unwrap();
        assert_eq!(entries, 3);
    }

    #[tokio::test]
    async fn test_resend_is_noop() {
        let db = test_db().await;
        let orders = service(&db).await;
        let stock = StockService::new(db.clone());

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        orders
            .update_items("b1", &order.order.id, &[burger(1, &[])])
            .await
            .unwrap();
        orders
            .send_pending_items("b1", &order.order.id, "user-1")
            .await
            .unwrap();
        orders
            .send_pending_items("b1", &order.order.id, "user-1")
            .await
            .unwrap();

        // Stock deducted exactly once.
        assert_eq!(stock.get_level("b1", "patty").await.unwrap().quantity_milli, -1000);
    }

    #[tokio::test]
    async fn test_update_totals_with_manual_discount_and_tip() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        orders
            .update_items("b1", &order.order.id, &[burger(2, &["cheese"])])
            .await
            .unwrap();

        // 24.00 items − 4.00 discount → taxable 20.00 at 10% = 2.00;
        // + 3.00 tip → 25.00 total.
        let detail = orders
            .update_totals("b1", &order.order.id, 300, 400)
            .await
            .unwrap();
        assert_eq!(detail.order.manual_discount_cents, 400);
        assert_eq!(detail.order.total_discount_cents, 400);
        assert_eq!(detail.order.total_tax_cents, 200);
        assert_eq!(detail.order.total_tip_cents, 300);
        assert_eq!(detail.order.total_amount_cents, 2400 + 200 + 300 - 400);
    }

    #[tokio::test]
    async fn test_update_waiter() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        let detail = orders
            .update_waiter("b1", &order.order.id, Some("waiter-7"))
            .await
            .unwrap();
        assert_eq!(detail.order.served_by.as_deref(), Some("waiter-7"));
    }

    #[tokio::test]
    async fn test_cancel_without_payments() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        let detail = orders.cancel("b1", &order.order.id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Cancelled);
        assert!(detail.order.closed_at.is_some());

        // The table is free again.
        let fresh = orders.create_for_table("b1", Some("t1")).await.unwrap();
        assert_ne!(fresh.order.id, order.order.id);
    }

    #[tokio::test]
    async fn test_cancel_with_payment_rejected() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        orders
            .update_items("b1", &order.order.id, &[burger(1, &[])])
            .await
            .unwrap();

        // Append a cash payment fact directly; the payment service's own
        // tests cover the full flow.
        let mut conn = db.pool().acquire().await.unwrap();
        OrderRepo::insert_payment(
            &mut conn,
            &tally_core::Payment {
                id: "pay-1".into(),
                order_id: order.order.id.clone(),
                amount_cents: 500,
                method: PaymentMethod::Cash,
                external_reference_id: None,
                is_refund: false,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        let err = orders.cancel("b1", &order.order.id).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    #[tokio::test]
    async fn test_mutations_rejected_on_closed_order() {
        let db = test_db().await;
        let orders = service(&db).await;

        let order = orders.create_for_table("b1", Some("t1")).await.unwrap();
        orders.cancel("b1", &order.order.id).await.unwrap();

        let err = orders
            .update_items("b1", &order.order.id, &[burger(1, &[])])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");

        let err = orders
            .update_totals("b1", &order.order.id, 0, 100)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");

        let err = orders
            .send_pending_items("b1", &order.order.id, "user-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    #[tokio::test]
    async fn test_get_order_unknown_is_not_found() {
        let db = test_db().await;
        let orders = service(&db).await;

        let err = orders.get_order("b1", "ghost").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
