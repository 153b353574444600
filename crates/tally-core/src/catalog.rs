//! # Catalog Collaborators
//!
//! The engine does not own the menu. Menu items, variations, recipes, tax
//! rates and discount rules belong to the surrounding admin application and
//! are consumed here as injected pure-function dependencies, so the totals
//! calculator and the fulfillment pipeline stay independently testable
//! without a database.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_items ──► Catalog::menu_item ──► MenuItemSnapshot               │
//! │                                          (name, price, tax, recipe)     │
//! │                                                                         │
//! │  recompute    ──► DiscountCalculator::discount_for ──► auto discount    │
//! │                                                                         │
//! │  send items   ──► MenuItemSnapshot.recipe                               │
//! │                   + VariationSnapshot.addon_recipe ──► stock deduction  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::OrderItem;

// =============================================================================
// Snapshot Types
// =============================================================================

/// One recipe line: how much of a product a single unit consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub product_id: String,
    /// Consumption per unit sold, in milli-units.
    pub quantity_milli: i64,
}

/// What the catalog returns for a menu item lookup.
///
/// The `snap_*` columns on an order item are copied from this at add-time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItemSnapshot {
    pub id: String,
    pub name: String,
    pub base_price_cents: i64,
    /// Category tax rate in basis points (825 = 8.25%).
    pub tax_rate_bps: u32,
    /// Disabled items cannot be added to orders.
    pub disabled: bool,
    /// Base-product consumption per unit sold.
    pub recipe: Vec<RecipeLine>,
}

/// What the catalog returns for a variation lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationSnapshot {
    pub id: String,
    pub name: String,
    pub price_adjustment_cents: i64,
    /// Disabled variations are silently filtered out of item updates.
    pub disabled: bool,
    /// Additional product consumption per unit when this variation applies.
    pub addon_recipe: Vec<RecipeLine>,
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Menu and variation lookup, scoped by business.
///
/// Returns `None` for unknown, deleted or cross-business ids — the caller
/// turns that into `InvalidReference`.
pub trait Catalog: Send + Sync {
    fn menu_item(&self, business_id: &str, menu_item_id: &str) -> Option<MenuItemSnapshot>;

    fn variation(&self, business_id: &str, variation_id: &str) -> Option<VariationSnapshot>;
}

/// Auto-applied discount calculator.
///
/// Given the current (non-voided) line items, returns the discount amount in
/// cents that business rules apply on top of any manual discount.
pub trait DiscountCalculator: Send + Sync {
    fn discount_for(&self, business_id: &str, items: &[OrderItem]) -> i64;
}

/// A discount calculator that never discounts. Useful default for tests and
/// for businesses with no automatic promotions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAutoDiscount;

impl DiscountCalculator for NoAutoDiscount {
    fn discount_for(&self, _business_id: &str, _items: &[OrderItem]) -> i64 {
        0
    }
}

// =============================================================================
// In-Memory Catalog
// =============================================================================

/// A [`Catalog`] backed by hash maps.
///
/// Used by tests and the seed binary; also a reasonable cache shape for an
/// HTTP layer that loads the menu once per request.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    // Keyed by (business_id, entity_id).
    menu_items: HashMap<(String, String), MenuItemSnapshot>,
    variations: HashMap<(String, String), VariationSnapshot>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_menu_item(&mut self, business_id: &str, item: MenuItemSnapshot) {
        self.menu_items
            .insert((business_id.to_string(), item.id.clone()), item);
    }

    pub fn insert_variation(&mut self, business_id: &str, variation: VariationSnapshot) {
        self.variations
            .insert((business_id.to_string(), variation.id.clone()), variation);
    }
}

impl Catalog for InMemoryCatalog {
    fn menu_item(&self, business_id: &str, menu_item_id: &str) -> Option<MenuItemSnapshot> {
        self.menu_items
            .get(&(business_id.to_string(), menu_item_id.to_string()))
            .cloned()
    }

    fn variation(&self, business_id: &str, variation_id: &str) -> Option<VariationSnapshot> {
        self.variations
            .get(&(business_id.to_string(), variation_id.to_string()))
            .cloned()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn latte() -> MenuItemSnapshot {
        MenuItemSnapshot {
            id: "latte".into(),
            name: "Latte".into(),
            base_price_cents: 450,
            tax_rate_bps: 1000,
            disabled: false,
            recipe: vec![
                RecipeLine {
                    product_id: "espresso-beans".into(),
                    quantity_milli: 18,
                },
                RecipeLine {
                    product_id: "milk".into(),
                    quantity_milli: 200,
                },
            ],
        }
    }

    #[test]
    fn test_lookup_is_business_scoped() {
        let mut catalog = InMemoryCatalog::new();
        catalog.insert_menu_item("biz-1", latte());

        assert!(catalog.menu_item("biz-1", "latte").is_some());
        assert!(catalog.menu_item("biz-2", "latte").is_none());
        assert!(catalog.menu_item("biz-1", "mocha").is_none());
    }

    #[test]
    fn test_variation_lookup() {
        let mut catalog = InMemoryCatalog::new();
        catalog.insert_variation(
            "biz-1",
            VariationSnapshot {
                id: "oat".into(),
                name: "Oat milk".into(),
                price_adjustment_cents: 50,
                disabled: false,
                addon_recipe: vec![RecipeLine {
                    product_id: "oat-milk".into(),
                    quantity_milli: 200,
                }],
            },
        );

        let v = catalog.variation("biz-1", "oat").unwrap();
        assert_eq!(v.price_adjustment_cents, 50);
        assert!(catalog.variation("biz-1", "soy").is_none());
    }

    #[test]
    fn test_no_auto_discount() {
        assert_eq!(NoAutoDiscount.discount_for("biz-1", &[]), 0);
    }
}
