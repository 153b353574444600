//! Shared fixtures for service tests: an in-memory database, a small demo
//! catalog, and scripted fakes for the external collaborators.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tally_core::catalog::{
    InMemoryCatalog, MenuItemSnapshot, NoAutoDiscount, RecipeLine, VariationSnapshot,
};
use tally_core::{EngineError, EngineResult, Product};

use crate::pool::{Database, DbConfig};
use crate::repository::ProductRepo;
use crate::service::{
    GiftCardRedeemer, OrderService, PaymentProcessor, PaymentService, StockService,
};

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) async fn seed_product(db: &Database, business_id: &str, id: &str, name: &str, unit: &str) {
    let now = Utc::now();
    let mut conn = db.pool().acquire().await.unwrap();
    ProductRepo::insert(
        &mut conn,
        &Product {
            id: id.into(),
            business_id: business_id.into(),
            name: name.into(),
            unit: unit.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .unwrap();
}

/// Products backing the demo catalog's recipes.
pub(crate) async fn seed_demo_products(db: &Database, business_id: &str) {
    seed_product(db, business_id, "patty", "Beef patty", "unit").await;
    seed_product(db, business_id, "bun", "Burger bun", "unit").await;
    seed_product(db, business_id, "cheese-slice", "Cheese slice", "unit").await;
}

/// A burger menu: base 10.00 at 10% tax consuming one patty and one bun;
/// "cheese" adds 2.00 and one cheese slice; "truffle" is disabled.
pub(crate) fn demo_catalog(business_id: &str) -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    catalog.insert_menu_item(
        business_id,
        MenuItemSnapshot {
            id: "burger".into(),
            name: "Burger".into(),
            base_price_cents: 1000,
            tax_rate_bps: 1000,
            disabled: false,
            recipe: vec![
                RecipeLine {
                    product_id: "patty".into(),
                    quantity_milli: 1000,
                },
                RecipeLine {
                    product_id: "bun".into(),
                    quantity_milli: 1000,
                },
            ],
        },
    );
    catalog.insert_variation(
        business_id,
        VariationSnapshot {
            id: "cheese".into(),
            name: "Extra cheese".into(),
            price_adjustment_cents: 200,
            disabled: false,
            addon_recipe: vec![RecipeLine {
                product_id: "cheese-slice".into(),
                quantity_milli: 1000,
            }],
        },
    );
    catalog.insert_variation(
        business_id,
        VariationSnapshot {
            id: "truffle".into(),
            name: "Truffle shavings".into(),
            price_adjustment_cents: 500,
            disabled: true,
            addon_recipe: vec![],
        },
    );
    catalog
}

// =============================================================================
// Scripted Collaborators
// =============================================================================

/// A payment processor that records every call and can be told to fail
/// refunds.
pub(crate) struct FakeProcessor {
    fail_refunds: AtomicBool,
    counter: AtomicU64,
    intents: Mutex<Vec<(String, i64)>>,
    refunds: Mutex<Vec<(String, i64)>>,
}

impl FakeProcessor {
    pub(crate) fn new() -> Self {
        FakeProcessor {
            fail_refunds: AtomicBool::new(false),
            counter: AtomicU64::new(0),
            intents: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_refunds(&self) {
        self.fail_refunds.store(true, Ordering::SeqCst);
    }

    pub(crate) fn intents(&self) -> Vec<(String, i64)> {
        self.intents.lock().unwrap().clone()
    }

    pub(crate) fn refunds(&self) -> Vec<(String, i64)> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_intent(&self, order_id: &str, amount_cents: i64) -> EngineResult<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.intents
            .lock()
            .unwrap()
            .push((order_id.to_string(), amount_cents));
        Ok(format!("pi_test_{n}"))
    }

    async fn refund_payment(
        &self,
        external_reference_id: &str,
        amount_cents: i64,
    ) -> EngineResult<()> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(EngineError::ExternalProcessor(
                "processor unavailable".into(),
            ));
        }
        self.refunds
            .lock()
            .unwrap()
            .push((external_reference_id.to_string(), amount_cents));
        Ok(())
    }
}

/// A gift-card store: codes are loaded with a value and redeemed at most
/// once.
pub(crate) struct FakeGiftCards {
    cards: Mutex<HashMap<String, i64>>,
}

impl FakeGiftCards {
    pub(crate) fn new() -> Self {
        FakeGiftCards {
            cards: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn load(&self, code: &str, value_cents: i64) {
        self.cards.lock().unwrap().insert(code.to_string(), value_cents);
    }
}

#[async_trait]
impl GiftCardRedeemer for FakeGiftCards {
    async fn validate_and_redeem(&self, _business_id: &str, code: &str) -> EngineResult<i64> {
        self.cards
            .lock()
            .unwrap()
            .remove(code)
            .ok_or_else(|| EngineError::invalid_reference("GiftCard", code))
    }
}

// =============================================================================
// Full Harness
// =============================================================================

/// All three services wired against one in-memory database, with the demo
/// catalog and scripted collaborators.
pub(crate) struct Harness {
    pub db: Database,
    pub orders: OrderService<InMemoryCatalog, NoAutoDiscount>,
    pub payments: PaymentService<Arc<FakeProcessor>, Arc<FakeGiftCards>>,
    pub stock: StockService,
    pub processor: Arc<FakeProcessor>,
    pub gift_cards: Arc<FakeGiftCards>,
}

pub(crate) async fn setup() -> Harness {
    let db = test_db().await;
    seed_demo_products(&db, "b1").await;

    let processor = Arc::new(FakeProcessor::new());
    let gift_cards = Arc::new(FakeGiftCards::new());

    Harness {
        orders: OrderService::new(db.clone(), demo_catalog("b1"), NoAutoDiscount),
        payments: PaymentService::new(db.clone(), processor.clone(), gift_cards.clone()),
        stock: StockService::new(db.clone()),
        db,
        processor,
        gift_cards,
    }
}
