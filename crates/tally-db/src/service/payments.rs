//! # Payment Service
//!
//! Appends payment facts, derives the order status from the payment set,
//! and fans refunds out across card and cash rails.
//!
//! ## Reconciliation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_payment                                                            │
//! │       │ validate (amount, order status)                                 │
//! │       ▼                                                                 │
//! │  card without reference ──► processor.create_intent ──► reference       │
//! │  gift card              ──► redeem ──► amount = min(value, remaining)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  append immutable fact ──► derive_status(payment set) ──► status write  │
//! │                                                                         │
//! │  Duplicate card webhook (same reference) is a read-only no-op.          │
//! │  Processor calls happen BEFORE the fact is written: a failure rolls     │
//! │  the whole transaction back and no row survives.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use tally_core::reconcile;
use tally_core::{
    validation, EngineError, EngineResult, Money, OrderDetail, OrderStatus, Payment,
    PaymentMethod, ValidationError,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbError;
use crate::pool::Database;
use crate::repository::OrderRepo;
use crate::service::{GiftCardRedeemer, PaymentProcessor};

/// Input for recording one payment against an order.
#[derive(Debug, Clone, Deserialize)]
pub struct AddPaymentInput {
    pub order_id: String,
    pub business_id: String,
    /// Requested amount in cents; for gift cards the applied amount is
    /// capped at `min(card value, remaining balance)` instead.
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Card: the processor reference (present for webhook-delivered
    /// payments, absent for payments initiated in-house). Gift card: the
    /// card code.
    pub external_reference_id: Option<String>,
    /// Manual refund fact (ad-hoc corrections); the normal refund path is
    /// [`PaymentService::refund_order`].
    #[serde(default)]
    pub is_refund: bool,
}

/// Payment operations, one transaction per call.
#[derive(Debug, Clone)]
pub struct PaymentService<P: PaymentProcessor, G: GiftCardRedeemer> {
    db: Database,
    processor: P,
    gift_cards: G,
}

impl<P: PaymentProcessor, G: GiftCardRedeemer> PaymentService<P, G> {
    pub fn new(db: Database, processor: P, gift_cards: G) -> Self {
        PaymentService {
            db,
            processor,
            gift_cards,
        }
    }

    /// Records a payment fact and re-derives the order status.
    ///
    /// Validations run before any mutation; the one deliberate exception to
    /// fail-fast is a duplicate card webhook (same external reference),
    /// which returns the unchanged order instead of erroring so processors
    /// can redeliver safely.
    pub async fn add_payment(&self, input: AddPaymentInput) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", &input.business_id)?;
        validation::validate_id("order_id", &input.order_id)?;
        validation::validate_amount("amount", input.amount_cents)?;

        let mut tx = self.db.begin().await?;

        let detail = OrderRepo::fetch_detail(&mut tx, &input.business_id, &input.order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", input.order_id.clone()))?;

        if detail.order.status == OrderStatus::Cancelled {
            return Err(EngineError::invalid_state("order is cancelled"));
        }
        if !input.is_refund && !detail.order.status.is_open() {
            return Err(EngineError::invalid_state("order is already paid"));
        }

        let (amount, reference) = if input.is_refund {
            let refundable = (detail.total_paid() - detail.total_refunded()).clamp_zero();
            if input.amount_cents > refundable.cents() {
                return Err(ValidationError::OutOfRange {
                    field: "amount",
                    min: 1,
                    max: refundable.cents(),
                }
                .into());
            }
            (Money::from_cents(input.amount_cents), input.external_reference_id.clone())
        } else {
            match input.method {
                PaymentMethod::Cash => (Money::from_cents(input.amount_cents), None),

                PaymentMethod::Card => match &input.external_reference_id {
                    Some(reference) => {
                        if reconcile::has_card_payment_with_reference(&detail.payments, reference)
                        {
                            debug!(
                                order_id = %input.order_id,
                                reference,
                                "Duplicate card webhook ignored"
                            );
                            tx.commit().await.map_err(DbError::from)?;
                            return Ok(detail);
                        }
                        (Money::from_cents(input.amount_cents), Some(reference.clone()))
                    }
                    None => {
                        let intent = self
                            .processor
                            .create_intent(&input.order_id, input.amount_cents)
                            .await?;
                        (Money::from_cents(input.amount_cents), Some(intent))
                    }
                },

                PaymentMethod::GiftCard => {
                    let code = input
                        .external_reference_id
                        .as_deref()
                        .ok_or(ValidationError::Required {
                            field: "gift_card_code",
                        })?;
                    // Redeeming burns the card, so nothing owed means no
                    // redeem call at all.
                    let remaining = detail.remaining_balance();
                    if !remaining.is_positive() {
                        return Err(EngineError::invalid_state(
                            "order has no remaining balance for a gift card",
                        ));
                    }
                    let value_cents = self
                        .gift_cards
                        .validate_and_redeem(&input.business_id, code)
                        .await?;
                    let applied = reconcile::gift_card_applicable(
                        Money::from_cents(value_cents),
                        remaining,
                    );
                    validation::validate_amount("gift_card_amount", applied.cents())?;
                    (applied, Some(code.to_string()))
                }
            }
        };

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: input.order_id.clone(),
            amount_cents: amount.cents(),
            method: input.method,
            external_reference_id: reference,
            is_refund: input.is_refund,
            created_at: Utc::now(),
        };
        OrderRepo::insert_payment(&mut tx, &payment).await?;

        let payments = OrderRepo::get_payments(&mut tx, &input.order_id).await?;
        let new_status =
            reconcile::derive_status(detail.order.status, detail.order.total_amount(), &payments);
        if new_status != detail.order.status {
            OrderRepo::set_status(&mut tx, &input.order_id, new_status, Utc::now()).await?;
        }

        let detail = OrderRepo::fetch_detail(&mut tx, &input.business_id, &input.order_id)
            .await?
            .ok_or_else(|| EngineError::Storage("order vanished mid-transaction".into()))?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %input.order_id,
            amount_cents = amount.cents(),
            method = ?input.method,
            status = ?detail.order.status,
            "Payment recorded"
        );
        Ok(detail)
    }

    /// Refunds part or all of what an order has collected.
    ///
    /// Card payments are refunded through the processor first, each capped
    /// at its own paid amount net of refunds already issued against it;
    /// whatever the processor cannot return comes
    /// back as a cash refund fact. Any processor failure aborts the whole
    /// transaction — no facts are written and the status is unchanged.
    pub async fn refund_order(
        &self,
        business_id: &str,
        order_id: &str,
        amount_cents: i64,
    ) -> EngineResult<OrderDetail> {
        validation::validate_id("business_id", business_id)?;
        validation::validate_id("order_id", order_id)?;
        validation::validate_amount("amount", amount_cents)?;

        let mut tx = self.db.begin().await?;

        let detail = OrderRepo::fetch_detail(&mut tx, business_id, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))?;

        if detail.order.status == OrderStatus::Cancelled {
            return Err(EngineError::invalid_state("order is cancelled"));
        }

        let refundable = (detail.total_paid() - detail.total_refunded()).clamp_zero();
        if amount_cents > refundable.cents() {
            return Err(ValidationError::OutOfRange {
                field: "amount",
                min: 1,
                max: refundable.cents(),
            }
            .into());
        }

        let requested = Money::from_cents(amount_cents);
        let plan = reconcile::plan_refund(&detail.payments, requested);

        // Processor first: if any external refund fails nothing is written.
        for refund in &plan.card_refunds {
            self.processor
                .refund_payment(&refund.external_reference_id, refund.amount.cents())
                .await?;
        }

        let now = Utc::now();
        for refund in &plan.card_refunds {
            OrderRepo::insert_payment(
                &mut tx,
                &Payment {
                    id: Uuid::new_v4().to_string(),
                    order_id: order_id.to_string(),
                    amount_cents: refund.amount.cents(),
                    method: PaymentMethod::Card,
                    external_reference_id: Some(refund.external_reference_id.clone()),
                    is_refund: true,
                    created_at: now,
                },
            )
            .await?;
        }
        if plan.cash_refund.is_positive() {
            OrderRepo::insert_payment(
                &mut tx,
                &Payment {
                    id: Uuid::new_v4().to_string(),
                    order_id: order_id.to_string(),
                    amount_cents: plan.cash_refund.cents(),
                    method: PaymentMethod::Cash,
                    external_reference_id: None,
                    is_refund: true,
                    created_at: now,
                },
            )
            .await?;
        }

        let payments = OrderRepo::get_payments(&mut tx, order_id).await?;
        let new_status =
            reconcile::derive_status(detail.order.status, detail.order.total_amount(), &payments);
        if new_status != detail.order.status {
            OrderRepo::set_status(&mut tx, order_id, new_status, now).await?;
        }

        let detail = OrderRepo::fetch_detail(&mut tx, business_id, order_id)
            .await?
            .ok_or_else(|| EngineError::Storage("order vanished mid-transaction".into()))?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id,
            amount_cents,
            card_refunds = plan.card_refunds.len(),
            cash_refund_cents = plan.cash_refund.cents(),
            "Refund recorded"
        );
        Ok(detail)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{setup, Harness};

    /// A table order with one 2x cheeseburger line: 24.00 + 2.40 tax.
    async fn open_order(h: &Harness) -> String {
        let order = h.orders.create_for_table("b1", Some("t1")).await.unwrap();
        h.orders
            .update_items(
                "b1",
                &order.order.id,
                &[crate::service::OrderItemInput {
                    menu_item_id: "burger".into(),
                    quantity: 2,
                    variation_ids: vec!["cheese".into()],
                }],
            )
            .await
            .unwrap();
        order.order.id
    }

    fn cash(order_id: &str, amount_cents: i64) -> AddPaymentInput {
        AddPaymentInput {
            order_id: order_id.into(),
            business_id: "b1".into(),
            amount_cents,
            method: PaymentMethod::Cash,
            external_reference_id: None,
            is_refund: false,
        }
    }

    fn card(order_id: &str, amount_cents: i64, reference: Option<&str>) -> AddPaymentInput {
        AddPaymentInput {
            order_id: order_id.into(),
            business_id: "b1".into(),
            amount_cents,
            method: PaymentMethod::Card,
            external_reference_id: reference.map(String::from),
            is_refund: false,
        }
    }

    fn gift(order_id: &str, code: &str) -> AddPaymentInput {
        AddPaymentInput {
            order_id: order_id.into(),
            business_id: "b1".into(),
            // Ignored for gift cards; the applied amount is derived.
            amount_cents: 1,
            method: PaymentMethod::GiftCard,
            external_reference_id: Some(code.into()),
            is_refund: false,
        }
    }

    #[tokio::test]
    async fn test_cash_payment_closes_order() {
        let h = setup().await;
        let order_id = open_order(&h).await;

        let detail = h.payments.add_payment(cash(&order_id, 2640)).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Paid);
        assert!(detail.order.closed_at.is_some());
        assert_eq!(detail.payments.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_payment_stays_open() {
        let h = setup().await;
        let order_id = open_order(&h).await;

        let detail = h.payments.add_payment(cash(&order_id, 1000)).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Open);
        assert_eq!(detail.remaining_balance().cents(), 1640);
    }

    /// Gift card 10.00 then cash 16.40 against a 26.40 order → PAID.
    #[tokio::test]
    async fn test_gift_card_then_cash() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.gift_cards.load("GIFT10", 1000);

        let detail = h.payments.add_payment(gift(&order_id, "GIFT10")).await.unwrap();
        assert_eq!(detail.payments[0].amount_cents, 1000);
        assert_eq!(detail.order.status, OrderStatus::Open);

        let detail = h.payments.add_payment(cash(&order_id, 1640)).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_gift_card_capped_at_remaining_balance() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.gift_cards.load("BIG", 100_00);

        let detail = h.payments.add_payment(gift(&order_id, "BIG")).await.unwrap();
        // Card held 100.00 but the order only needed 26.40.
        assert_eq!(detail.payments[0].amount_cents, 2640);
        assert_eq!(detail.order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_gift_card_is_single_use() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.gift_cards.load("ONCE", 500);

        h.payments.add_payment(gift(&order_id, "ONCE")).await.unwrap();
        let err = h
            .payments
            .add_payment(gift(&order_id, "ONCE"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_reference");
    }

    #[tokio::test]
    async fn test_card_webhook_duplicate_is_noop() {
        let h = setup().await;
        let order_id = open_order(&h).await;

        let first = h
            .payments
            .add_payment(card(&order_id, 2640, Some("pi_123")))
            .await
            .unwrap();
        assert_eq!(first.order.status, OrderStatus::Paid);

        // Redelivered webhook: same reference, no second fact, no error.
        let second = h
            .payments
            .add_payment(card(&order_id, 2640, Some("pi_123")))
            .await
            .unwrap();
        assert_eq!(second.payments.len(), 1);
        assert_eq!(second.order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_card_without_reference_creates_intent() {
        let h = setup().await;
        let order_id = open_order(&h).await;

        let detail = h
            .payments
            .add_payment(card(&order_id, 2640, None))
            .await
            .unwrap();

        let reference = detail.payments[0].external_reference_id.clone().unwrap();
        assert!(reference.starts_with("pi_"));
        assert_eq!(h.processor.intents(), vec![(order_id.clone(), 2640)]);
    }

    #[tokio::test]
    async fn test_payment_on_paid_order_rejected() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.payments.add_payment(cash(&order_id, 2640)).await.unwrap();

        let err = h.payments.add_payment(cash(&order_id, 100)).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    #[tokio::test]
    async fn test_payment_on_cancelled_order_rejected() {
        let h = setup().await;
        let order = h.orders.create_for_table("b1", Some("t9")).await.unwrap();
        h.orders.cancel("b1", &order.order.id).await.unwrap();

        let err = h
            .payments
            .add_payment(cash(&order.order.id, 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    /// Card 10.00 + cash 16.40 collected; a 26.40 refund goes 10.00 through
    /// the processor and 16.40 as cash.
    #[tokio::test]
    async fn test_refund_splits_across_rails() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.payments
            .add_payment(card(&order_id, 1000, Some("pi_1")))
            .await
            .unwrap();
        h.payments.add_payment(cash(&order_id, 1640)).await.unwrap();

        let detail = h.payments.refund_order("b1", &order_id, 2640).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Refunded);
        assert_eq!(detail.total_refunded().cents(), 2640);

        // Exactly one processor-side refund, capped at the card's 10.00.
        assert_eq!(h.processor.refunds(), vec![("pi_1".to_string(), 1000)]);

        let cash_refunds: Vec<&Payment> = detail
            .payments
            .iter()
            .filter(|p| p.is_refund && p.method == PaymentMethod::Cash)
            .collect();
        assert_eq!(cash_refunds.len(), 1);
        assert_eq!(cash_refunds[0].amount_cents, 1640);
    }

    #[tokio::test]
    async fn test_partial_refund() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.payments.add_payment(cash(&order_id, 2640)).await.unwrap();

        let detail = h.payments.refund_order("b1", &order_id, 500).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Refunded);
        assert_eq!(detail.total_refunded().cents(), 500);
    }

    #[tokio::test]
    async fn test_refund_cannot_exceed_collected() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.payments.add_payment(cash(&order_id, 1000)).await.unwrap();

        let err = h
            .payments
            .refund_order("b1", &order_id, 1001)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        // Repeated refunds are capped by what remains.
        h.payments.refund_order("b1", &order_id, 600).await.unwrap();
        let err = h
            .payments
            .refund_order("b1", &order_id, 500)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    /// Two successive refunds against a card 10.00 + cash 16.40 order: the
    /// second may not hit the processor again once the card is exhausted.
    #[tokio::test]
    async fn test_repeated_refunds_respect_card_channel_cap() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.payments
            .add_payment(card(&order_id, 1000, Some("pi_1")))
            .await
            .unwrap();
        h.payments.add_payment(cash(&order_id, 1640)).await.unwrap();

        h.payments.refund_order("b1", &order_id, 1000).await.unwrap();
        let detail = h.payments.refund_order("b1", &order_id, 1000).await.unwrap();
        assert_eq!(detail.total_refunded().cents(), 2000);

        // The card collected 10.00 exactly once through the processor; the
        // second 10.00 came back as cash.
        assert_eq!(h.processor.refunds(), vec![("pi_1".to_string(), 1000)]);
        let cash_refunded: i64 = detail
            .payments
            .iter()
            .filter(|p| p.is_refund && p.method == PaymentMethod::Cash)
            .map(|p| p.amount_cents)
            .sum();
        assert_eq!(cash_refunded, 1000);
    }

    /// A gift card offered against an order that owes nothing must not be
    /// redeemed: the redeem call is irreversible.
    #[tokio::test]
    async fn test_gift_card_survives_zero_balance_order() {
        let h = setup().await;
        let empty = h.orders.create_for_table("b1", Some("t2")).await.unwrap();
        h.gift_cards.load("KEEP", 1000);

        let err = h
            .payments
            .add_payment(gift(&empty.order.id, "KEEP"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");

        // Never redeemed, still spendable on a real order.
        let order_id = open_order(&h).await;
        let detail = h.payments.add_payment(gift(&order_id, "KEEP")).await.unwrap();
        assert_eq!(detail.payments[0].amount_cents, 1000);
    }

    #[tokio::test]
    async fn test_processor_failure_leaves_no_facts() {
        let h = setup().await;
        let order_id = open_order(&h).await;
        h.payments
            .add_payment(card(&order_id, 2640, Some("pi_1")))
            .await
            .unwrap();

        h.processor.fail_refunds();
        let err = h
            .payments
            .refund_order("b1", &order_id, 2640)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "external_processor");

        // Rolled back: still paid, no refund facts.
        let detail = h.orders.get_order("b1", &order_id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Paid);
        assert_eq!(detail.total_refunded().cents(), 0);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let h = setup().await;
        let err = h.payments.add_payment(cash("ghost", 100)).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
