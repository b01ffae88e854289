//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::{Money, Pricing};

use super::{
    CustomerInfo, LineItem, OrderError, OrderNotes, OrderNumber, OrderStatus, PaymentInfo,
    PaymentMethod, PaymentStatus, ProviderArtifacts, Refund, RefundStatus, ShippingAddress,
    TimelineEntry, TrackingInfo,
};

/// Input for constructing a new order through [`Order::create`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer: UserId,
    pub customer_info: CustomerInfo,
    pub line_items: Vec<LineItem>,
    pub pricing: Pricing,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub customer_note: Option<String>,
}

/// Order aggregate root.
///
/// All state changes go through named mutators that enforce the status
/// state machine and keep the timeline append-only. There is no way to
/// change `status` without recording a timeline entry in the same call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,

    /// Human-readable number, assigned once at creation, never regenerated.
    order_number: OrderNumber,

    /// Owning customer.
    customer: UserId,

    /// Contact snapshot taken at placement time.
    customer_info: CustomerInfo,

    /// Frozen copies of the purchased product data.
    line_items: Vec<LineItem>,

    pricing: Pricing,

    shipping_address: ShippingAddress,

    payment: PaymentInfo,

    status: OrderStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tracking: Option<TrackingInfo>,

    /// Append-only audit log. Entries are never mutated or reordered.
    timeline: Vec<TimelineEntry>,

    #[serde(default)]
    notes: OrderNotes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    refund: Option<Refund>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    /// Storage version for optimistic concurrency, managed by the store.
    #[serde(default)]
    version: i64,
}

impl Order {
    /// Creates a new order in `pending` status with its initial timeline
    /// entry. Validates line items and the pricing identity.
    pub fn create(input: NewOrder) -> Result<Self, OrderError> {
        if input.line_items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        for item in &input.line_items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    sku: item.sku.clone(),
                    quantity: item.quantity,
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    sku: item.sku.clone(),
                    price: item.unit_price.cents(),
                });
            }
        }

        let computed_subtotal = input
            .line_items
            .iter()
            .map(LineItem::line_total)
            .sum::<Money>();
        if !input.pricing.verify() || input.pricing.subtotal != computed_subtotal {
            return Err(OrderError::InvalidPricing);
        }

        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            order_number: input.order_number,
            customer: input.customer,
            customer_info: input.customer_info,
            line_items: input.line_items,
            pricing: input.pricing,
            shipping_address: input.shipping_address,
            payment: PaymentInfo::new(input.payment_method),
            status: OrderStatus::Pending,
            tracking: None,
            timeline: vec![TimelineEntry::new(
                OrderStatus::Pending.as_str(),
                "Order placed",
                None,
            )],
            notes: OrderNotes {
                customer: input.customer_note,
                internal: None,
            },
            refund: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn customer(&self) -> UserId {
        self.customer
    }

    pub fn customer_info(&self) -> &CustomerInfo {
        &self.customer_info
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment(&self) -> &PaymentInfo {
        &self.payment
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn tracking(&self) -> Option<&TrackingInfo> {
        self.tracking.as_ref()
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn notes(&self) -> &OrderNotes {
        &self.notes
    }

    pub fn refund(&self) -> Option<&Refund> {
        self.refund.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total quantity across all line items.
    pub fn total_items(&self) -> u32 {
        self.line_items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

// Mutators
impl Order {
    /// Transitions the order to `new_status` and appends exactly one
    /// timeline entry. Rejects transitions the state machine forbids.
    pub fn set_status(
        &mut self,
        new_status: OrderStatus,
        message: Option<String>,
        actor: Option<UserId>,
    ) -> Result<(), OrderError> {
        if !self.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        let message =
            message.unwrap_or_else(|| format!("Status changed to: {new_status}"));
        self.status = new_status;
        self.append_timeline(new_status.as_str(), message, actor);
        Ok(())
    }

    /// Appends a timeline entry without touching `status`.
    ///
    /// Used for payment events (`payment_pending`, `payment_confirmed`,
    /// `payment_failed`) that are audit-worthy but not fulfillment states.
    pub fn append_timeline(
        &mut self,
        label: impl Into<String>,
        message: impl Into<String>,
        actor: Option<UserId>,
    ) {
        self.timeline.push(TimelineEntry::new(label, message, actor));
        self.updated_at = Utc::now();
    }

    /// Updates the payment sub-state. Returns `false` when the same
    /// `(status, transaction_id)` pair was already applied, so provider
    /// retries and duplicate webhooks do not produce duplicate effects.
    /// A call without a transaction id dedupes on status alone.
    pub fn update_payment(
        &mut self,
        status: PaymentStatus,
        transaction_id: Option<String>,
        provider_response: Option<serde_json::Value>,
    ) -> bool {
        let same_transaction = match (&transaction_id, &self.payment.transaction_id) {
            (None, _) => true,
            (Some(new), Some(current)) => new == current,
            (Some(_), None) => false,
        };
        if self.payment.status == status && same_transaction {
            return false;
        }

        self.payment.status = status;
        if transaction_id.is_some() {
            self.payment.transaction_id = transaction_id;
        }
        if provider_response.is_some() {
            self.payment.provider_response = provider_response;
        }
        if status == PaymentStatus::Paid {
            self.payment.payment_date = Some(Utc::now());
        }
        self.updated_at = Utc::now();
        true
    }

    /// Stores provider artifacts (PIX code, boleto URL, ...) on the
    /// payment record.
    pub fn apply_artifacts(&mut self, artifacts: ProviderArtifacts) {
        self.payment.artifacts = artifacts;
        self.updated_at = Utc::now();
    }

    /// Attaches carrier tracking data.
    pub fn set_tracking(&mut self, tracking: TrackingInfo) {
        self.tracking = Some(tracking);
        self.updated_at = Utc::now();
    }

    /// Sets the internal (admin-facing) note.
    pub fn set_internal_note(&mut self, note: impl Into<String>) {
        self.notes.internal = Some(note.into());
        self.updated_at = Utc::now();
    }

    /// Records a refund request. Only paid orders can be refunded, and
    /// only one refund record may exist.
    pub fn request_refund(
        &mut self,
        amount: Money,
        reason: impl Into<String>,
        requested_by: Option<UserId>,
    ) -> Result<(), OrderError> {
        if self.payment.status != PaymentStatus::Paid {
            return Err(OrderError::RefundNotAllowed {
                payment_status: self.payment.status,
            });
        }
        if self.refund.is_some() {
            return Err(OrderError::RefundAlreadyRequested);
        }
        if !amount.is_positive() || amount > self.pricing.total {
            return Err(OrderError::InvalidRefundAmount {
                amount,
                total: self.pricing.total,
            });
        }

        self.refund = Some(Refund {
            amount,
            reason: reason.into(),
            status: RefundStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            processed_by: requested_by,
        });
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Money, PricingPolicy};
    use common::ProductId;

    fn lines() -> Vec<LineItem> {
        vec![LineItem {
            product_id: ProductId::new(),
            name: "Conjunto Moletom".to_string(),
            unit_price: Money::from_cents(5000),
            quantity: 2,
            size: "M".to_string(),
            color: "verde".to_string(),
            sku: "CM-M-VD".to_string(),
            image_url: None,
        }]
    }

    fn new_order_input(line_items: Vec<LineItem>) -> NewOrder {
        let pricing = PricingPolicy::default()
            .quote(&line_items, Money::zero(), Money::zero())
            .unwrap();
        NewOrder {
            order_number: OrderNumber::from_sequence(1),
            customer: UserId::new(),
            customer_info: CustomerInfo {
                name: "Ana Souza".to_string(),
                email: "ana@example.com".to_string(),
                phone: "+55 11 99999-0000".to_string(),
                tax_id: None,
            },
            line_items,
            pricing,
            shipping_address: ShippingAddress {
                street: "Rua das Flores".to_string(),
                number: "100".to_string(),
                complement: None,
                neighborhood: "Centro".to_string(),
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
                zip_code: "01000-000".to_string(),
                country: "Brasil".to_string(),
            },
            payment_method: PaymentMethod::Pix,
            customer_note: None,
        }
    }

    fn order() -> Order {
        Order::create(new_order_input(lines())).unwrap()
    }

    #[test]
    fn create_starts_pending_with_one_timeline_entry() {
        let order = order();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.timeline().len(), 1);
        assert_eq!(order.timeline()[0].status, "pending");
        assert_eq!(order.payment().status, PaymentStatus::Pending);
        assert_eq!(order.order_number().as_str(), "PM-000001");
    }

    #[test]
    fn create_rejects_empty_order() {
        let mut input = new_order_input(lines());
        input.line_items.clear();
        let result = Order::create(input);
        assert!(matches!(result, Err(OrderError::EmptyOrder)));
    }

    #[test]
    fn create_rejects_zero_quantity() {
        let mut items = lines();
        items[0].quantity = 0;
        let mut input = new_order_input(lines());
        input.line_items = items;
        let result = Order::create(input);
        assert!(matches!(result, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn create_rejects_pricing_mismatch() {
        let mut input = new_order_input(lines());
        input.pricing.subtotal = Money::from_cents(1);
        input.pricing.total = input.pricing.subtotal + input.pricing.shipping;
        let result = Order::create(input);
        assert!(matches!(result, Err(OrderError::InvalidPricing)));
    }

    #[test]
    fn set_status_appends_exactly_one_entry() {
        let mut order = order();
        order
            .set_status(OrderStatus::Confirmed, None, None)
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.timeline().len(), 2);
        assert_eq!(order.timeline()[1].status, "confirmed");
    }

    #[test]
    fn set_status_rejects_illegal_transition() {
        let mut order = order();
        let result = order.set_status(OrderStatus::Shipped, None, None);
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            })
        ));
        // No entry appended for the failed attempt.
        assert_eq!(order.timeline().len(), 1);
    }

    #[test]
    fn timeline_grows_by_one_per_change_and_keeps_old_entries() {
        let mut order = order();
        let first_entry = order.timeline()[0].clone();

        order
            .set_status(OrderStatus::Confirmed, None, None)
            .unwrap();
        order
            .set_status(OrderStatus::Processing, None, None)
            .unwrap();
        order.set_status(OrderStatus::Shipped, None, None).unwrap();

        assert_eq!(order.timeline().len(), 4);
        assert_eq!(order.timeline()[0], first_entry);
    }

    #[test]
    fn cancellation_allowed_from_pending() {
        let mut order = order();
        order
            .set_status(
                OrderStatus::Cancelled,
                Some("Customer changed mind".to_string()),
                None,
            )
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.is_terminal());
    }

    #[test]
    fn cancellation_rejected_after_shipment() {
        let mut order = order();
        order
            .set_status(OrderStatus::Confirmed, None, None)
            .unwrap();
        order
            .set_status(OrderStatus::Processing, None, None)
            .unwrap();
        order.set_status(OrderStatus::Shipped, None, None).unwrap();

        let result = order.set_status(OrderStatus::Cancelled, None, None);
        assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
    }

    #[test]
    fn update_payment_sets_paid_date() {
        let mut order = order();
        let changed = order.update_payment(
            PaymentStatus::Paid,
            Some("TX-1".to_string()),
            Some(serde_json::json!({"approved": true})),
        );
        assert!(changed);
        assert_eq!(order.payment().status, PaymentStatus::Paid);
        assert!(order.payment().payment_date.is_some());
        assert_eq!(order.payment().transaction_id.as_deref(), Some("TX-1"));
    }

    #[test]
    fn update_payment_is_idempotent_per_transaction() {
        let mut order = order();
        assert!(order.update_payment(PaymentStatus::Paid, Some("TX-1".to_string()), None));
        let first_date = order.payment().payment_date;

        let changed = order.update_payment(PaymentStatus::Paid, Some("TX-1".to_string()), None);
        assert!(!changed);
        assert_eq!(order.payment().payment_date, first_date);
    }

    #[test]
    fn refund_requires_paid_payment() {
        let mut order = order();
        let result = order.request_refund(Money::from_cents(1000), "defect", None);
        assert!(matches!(result, Err(OrderError::RefundNotAllowed { .. })));

        order.update_payment(PaymentStatus::Paid, Some("TX-1".to_string()), None);
        order
            .request_refund(Money::from_cents(1000), "defect", None)
            .unwrap();
        assert_eq!(order.refund().unwrap().status, RefundStatus::Pending);
    }

    #[test]
    fn refund_amount_bounded_by_total() {
        let mut order = order();
        order.update_payment(PaymentStatus::Paid, Some("TX-1".to_string()), None);
        let over = order.pricing().total + Money::from_cents(1);
        let result = order.request_refund(over, "too much", None);
        assert!(matches!(result, Err(OrderError::InvalidRefundAmount { .. })));
    }

    #[test]
    fn total_items_sums_quantities() {
        assert_eq!(order().total_items(), 2);
    }

    #[test]
    fn serialization_roundtrip() {
        let order = order();
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), order.id());
        assert_eq!(back.status(), order.status());
        assert_eq!(back.timeline().len(), 1);
        assert_eq!(back.pricing(), order.pricing());
    }
}
