//! Order lifecycle service: placement, cancellation, status updates,
//! and order queries.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, OrderId, ProductId, Role, UserId};
use domain::{
    CustomerInfo, LineItem, Money, NewOrder, Order, OrderNumber, OrderStatus, PaymentMethod,
    PricingPolicy, ShippingAddress, TrackingInfo,
};
use store::{OrderFilter, OrderStore, Page, ProductStore};

use crate::auth::{require_owner_or_admin, require_role};
use crate::error::{StockShortage, StockShortages};
use crate::events::{self, StorefrontEvent};
use crate::inventory::InventoryLedger;
use crate::{CheckoutError, Result, cas};

/// One line of a submitted cart.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
    pub quantity: u32,
}

/// Input for [`OrderLifecycle::place_order`].
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub customer: UserId,
    pub customer_info: CustomerInfo,
    pub lines: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub customer_note: Option<String>,
}

/// Orchestrates order placement, cancellation, and fulfillment-status
/// changes over the stores and the inventory ledger.
pub struct OrderLifecycle<O, P> {
    orders: Arc<O>,
    products: Arc<P>,
    ledger: InventoryLedger<P>,
    pricing: PricingPolicy,
}

impl<O, P> Clone for OrderLifecycle<O, P> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            products: self.products.clone(),
            ledger: self.ledger.clone(),
            pricing: self.pricing,
        }
    }
}

impl<O: OrderStore, P: ProductStore> OrderLifecycle<O, P> {
    /// Creates a new lifecycle service.
    pub fn new(orders: Arc<O>, products: Arc<P>, pricing: PricingPolicy) -> Self {
        let ledger = InventoryLedger::new(products.clone());
        Self {
            orders,
            products,
            ledger,
            pricing,
        }
    }

    /// Returns the inventory ledger used by this service.
    pub fn ledger(&self) -> &InventoryLedger<P> {
        &self.ledger
    }

    /// Places an order from a validated cart.
    ///
    /// Availability is checked for every line before anything is
    /// reserved; if any line falls short, the whole placement fails with
    /// one aggregated `InsufficientStock` error and no stock moves. A
    /// reservation that fails after persistence (a concurrent purchase
    /// took the stock in between) cancels the freshly created order and
    /// rolls back the lines already taken.
    #[tracing::instrument(skip(self, cmd), fields(customer = %cmd.customer))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order> {
        metrics::counter!("orders_place_attempts_total").increment(1);
        let started = std::time::Instant::now();

        // 1. Resolve every referenced product and variant.
        let mut resolved = Vec::with_capacity(cmd.lines.len());
        for line in &cmd.lines {
            let product = self
                .products
                .get(line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;
            if product.variant(&line.size).is_none() {
                return Err(CheckoutError::VariantNotFound {
                    product_id: line.product_id,
                    size: line.size.clone(),
                });
            }
            resolved.push((product, line));
        }

        // 2. Check availability for all lines, collecting every shortage
        // before reserving anything.
        let mut shortages = Vec::new();
        for (product, line) in &resolved {
            let availability = self
                .ledger
                .check_available(line.product_id, &line.size)
                .await?;
            if availability.stock < line.quantity {
                shortages.push(StockShortage {
                    product_id: line.product_id,
                    name: product.name.clone(),
                    size: line.size.clone(),
                    requested: line.quantity,
                    available: availability.stock,
                });
            }
        }
        if !shortages.is_empty() {
            metrics::counter!("orders_rejected_insufficient_stock_total").increment(1);
            return Err(CheckoutError::InsufficientStock(StockShortages(shortages)));
        }

        // 3. Freeze line items and compute pricing.
        let mut line_items = Vec::with_capacity(resolved.len());
        for (product, line) in &resolved {
            let variant = product
                .variant(&line.size)
                .ok_or_else(|| CheckoutError::VariantNotFound {
                    product_id: line.product_id,
                    size: line.size.clone(),
                })?;
            line_items.push(LineItem {
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity: line.quantity,
                size: line.size.clone(),
                color: line.color.clone(),
                sku: variant.sku.clone(),
                image_url: product.primary_image().map(String::from),
            });
        }
        let pricing = self
            .pricing
            .quote(&line_items, Money::zero(), Money::zero())?;

        // 4. Construct the aggregate with a store-allocated number.
        let sequence = self.orders.next_order_sequence().await?;
        let order = Order::create(NewOrder {
            order_number: OrderNumber::from_sequence(sequence),
            customer: cmd.customer,
            customer_info: cmd.customer_info,
            line_items,
            pricing,
            shipping_address: cmd.shipping_address,
            payment_method: cmd.payment_method,
            customer_note: cmd.customer_note,
        })?;

        // 5. Persist.
        self.orders.insert(&order).await?;

        // 6. Reserve stock for every line. This is the concurrency seam:
        // a line can come up short here even though step 2 saw enough.
        let mut reserved: Vec<&CartLine> = Vec::new();
        for (product, line) in &resolved {
            match self
                .ledger
                .reserve(line.product_id, &line.size, line.quantity)
                .await
            {
                Ok(()) => reserved.push(*line),
                Err(e) => {
                    self.compensate_failed_placement(&order, &reserved).await;
                    metrics::counter!("orders_rejected_insufficient_stock_total").increment(1);
                    return Err(CheckoutError::from_stock_error(e, &product.name));
                }
            }
        }

        metrics::counter!("orders_placed_total").increment(1);
        metrics::histogram!("place_order_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        events::emit(&StorefrontEvent::OrderCreated {
            order_id: order.id(),
            order_number: order.order_number().to_string(),
            new_status: order.status(),
            timestamp: Utc::now(),
        });

        Ok(order)
    }

    /// Rolls back a placement that lost the reservation race: releases
    /// the lines already taken and cancels the persisted order. Both are
    /// best-effort; failures are logged for out-of-band reconciliation.
    async fn compensate_failed_placement(&self, order: &Order, reserved: &[&CartLine]) {
        for line in reserved {
            if let Err(e) = self
                .ledger
                .release(line.product_id, &line.size, line.quantity)
                .await
            {
                tracing::error!(
                    order_id = %order.id(),
                    product_id = %line.product_id,
                    size = %line.size,
                    error = %e,
                    "failed to roll back reservation"
                );
            }
        }

        let result = cas::update_with_retry(self.orders.as_ref(), order.id(), |order| {
            order.set_status(
                OrderStatus::Cancelled,
                Some("Cancelled: stock taken by a concurrent order".to_string()),
                None,
            )?;
            Ok(true)
        })
        .await;
        if let Err(e) = result {
            tracing::error!(order_id = %order.id(), error = %e, "failed to cancel order after reservation race");
        }
    }

    /// Cancels an order on behalf of its owner or an administrator.
    ///
    /// Rejects with `InvalidTransition` once the order has shipped.
    /// Stock release is best-effort per line: a failed release never
    /// undoes an authorized cancellation.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Order> {
        let mut previous = OrderStatus::Pending;
        let order = cas::update_with_retry(self.orders.as_ref(), order_id, |order| {
            require_owner_or_admin(actor, order.customer())?;
            previous = order.status();
            let message = match &reason {
                Some(r) => format!("Order cancelled. Reason: {r}"),
                None => "Order cancelled".to_string(),
            };
            order.set_status(OrderStatus::Cancelled, Some(message), Some(actor.user_id))?;
            Ok(true)
        })
        .await?;

        for item in order.line_items() {
            if let Err(e) = self
                .ledger
                .release(item.product_id, &item.size, item.quantity)
                .await
            {
                tracing::error!(
                    order_id = %order.id(),
                    product_id = %item.product_id,
                    size = %item.size,
                    error = %e,
                    "stock release failed after cancellation"
                );
            }
        }

        metrics::counter!("orders_cancelled_total").increment(1);
        events::emit(&StorefrontEvent::OrderStatusChanged {
            order_id: order.id(),
            order_number: order.order_number().to_string(),
            previous_status: previous,
            new_status: OrderStatus::Cancelled,
            timestamp: Utc::now(),
        });

        Ok(order)
    }

    /// Moves an order to a new fulfillment status (administrators only).
    /// Optionally attaches tracking data and an internal note.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        actor: Actor,
        new_status: OrderStatus,
        message: Option<String>,
        tracking: Option<TrackingInfo>,
        internal_note: Option<String>,
    ) -> Result<Order> {
        require_role(actor, Role::Admin)?;

        let mut previous = OrderStatus::Pending;
        let order = cas::update_with_retry(self.orders.as_ref(), order_id, |order| {
            previous = order.status();
            order.set_status(new_status, message.clone(), Some(actor.user_id))?;
            if let Some(t) = tracking.clone() {
                order.set_tracking(t);
            }
            if let Some(note) = internal_note.clone() {
                order.set_internal_note(note);
            }
            Ok(true)
        })
        .await?;

        events::emit(&StorefrontEvent::OrderStatusChanged {
            order_id: order.id(),
            order_number: order.order_number().to_string(),
            previous_status: previous,
            new_status,
            timestamp: Utc::now(),
        });

        Ok(order)
    }

    /// Loads a single order. Customers can only read their own.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId, actor: Actor) -> Result<Order> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;
        require_owner_or_admin(actor, order.customer())?;
        Ok(order)
    }

    /// Lists orders, newest first. Customers see only their own orders
    /// regardless of the filter; administrators may filter freely.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(
        &self,
        actor: Actor,
        mut filter: OrderFilter,
        page: Page,
    ) -> Result<(Vec<Order>, u64)> {
        if !actor.is_admin() {
            filter.customer = Some(actor.user_id);
        }
        Ok(self.orders.list(&filter, page).await?)
    }
}
