//! Payment reconciliation: maps provider outcomes onto order payment
//! state, idempotently.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, OrderId};
use domain::{Money, Order, OrderStatus, PaymentMethod, PaymentStatus};
use store::OrderStore;

use crate::auth::require_owner_or_admin;
use crate::events::{self, StorefrontEvent};
use crate::provider::{AttemptOutcome, ProviderInput, ProviderRegistry};
use crate::{CheckoutError, Result, cas};

/// A provider's final verdict on a payment, delivered synchronously or
/// through a callback/webhook.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub provider_response: serde_json::Value,
    pub failure_message: Option<String>,
}

/// Reconciles payment attempts and provider results against orders.
pub struct PaymentReconciliation<O> {
    orders: Arc<O>,
    providers: ProviderRegistry,
}

impl<O> Clone for PaymentReconciliation<O> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            providers: self.providers.clone(),
        }
    }
}

impl<O: OrderStore> PaymentReconciliation<O> {
    /// Creates a new reconciliation service.
    pub fn new(orders: Arc<O>, providers: ProviderRegistry) -> Self {
        Self { orders, providers }
    }

    /// Starts a payment attempt for an order.
    ///
    /// Validates that the caller owns the order and that `amount`
    /// matches the order total exactly (amounts are integer centavos,
    /// so no rounding tolerance is needed), then delegates to the
    /// provider adapter. Artifacts and the
    /// `payment_pending` timeline entry are stored on the order; if the
    /// adapter resolved synchronously, the result is applied in the same
    /// write.
    #[tracing::instrument(skip(self, input))]
    pub async fn record_attempt(
        &self,
        order_id: OrderId,
        actor: Actor,
        method: PaymentMethod,
        amount: Money,
        input: ProviderInput,
    ) -> Result<Order> {
        metrics::counter!("payment_attempts_total").increment(1);

        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;
        require_owner_or_admin(actor, order.customer())?;

        let expected = order.pricing().total;
        if amount != expected {
            return Err(CheckoutError::AmountMismatch {
                expected,
                submitted: amount,
            });
        }

        let provider = self.providers.get(method)?;
        let response = provider.attempt(&order, &input).await?;

        let updated = cas::update_with_retry(self.orders.as_ref(), order_id, |order| {
            if !response.artifacts.is_empty() {
                order.apply_artifacts(response.artifacts.clone());
            }
            order.update_payment(
                PaymentStatus::Pending,
                response.transaction_id.clone(),
                Some(response.raw.clone()),
            );
            order.append_timeline(
                "payment_pending",
                format!("Awaiting {method} payment"),
                Some(actor.user_id),
            );

            match &response.outcome {
                AttemptOutcome::Pending => {}
                AttemptOutcome::Approved => {
                    apply_success(
                        order,
                        response.transaction_id.clone(),
                        response.raw.clone(),
                    )?;
                }
                AttemptOutcome::Declined { message } => {
                    apply_failure(
                        order,
                        response.transaction_id.clone(),
                        response.raw.clone(),
                        Some(message.clone()),
                    );
                }
            }
            Ok(true)
        })
        .await?;

        metrics::counter!("payments_recorded_total").increment(1);
        events::emit(&StorefrontEvent::PaymentRecorded {
            order_id: updated.id(),
            order_number: updated.order_number().to_string(),
            payment_status: updated.payment().status,
            timestamp: Utc::now(),
        });

        Ok(updated)
    }

    /// Applies a provider result to an order.
    ///
    /// Safe to invoke repeatedly for the same `transaction_id`: replays
    /// neither re-transition the order nor duplicate timeline entries.
    #[tracing::instrument(skip(self, outcome))]
    pub async fn record_result(&self, order_id: OrderId, outcome: PaymentOutcome) -> Result<Order> {
        let updated = cas::update_with_retry(self.orders.as_ref(), order_id, |order| {
            let changed = if outcome.success {
                apply_success(
                    order,
                    outcome.transaction_id.clone(),
                    outcome.provider_response.clone(),
                )?
            } else {
                apply_failure(
                    order,
                    outcome.transaction_id.clone(),
                    outcome.provider_response.clone(),
                    outcome.failure_message.clone(),
                )
            };
            Ok(changed)
        })
        .await?;

        metrics::counter!("payments_recorded_total").increment(1);
        events::emit(&StorefrontEvent::PaymentRecorded {
            order_id: updated.id(),
            order_number: updated.order_number().to_string(),
            payment_status: updated.payment().status,
            timestamp: Utc::now(),
        });

        Ok(updated)
    }
}

/// Marks the payment paid and confirms the order. Returns false when the
/// same transaction was already applied (duplicate webhook).
fn apply_success(
    order: &mut Order,
    transaction_id: Option<String>,
    raw: serde_json::Value,
) -> Result<bool> {
    if !order.update_payment(PaymentStatus::Paid, transaction_id, Some(raw)) {
        return Ok(false);
    }

    order.append_timeline("payment_confirmed", "Payment confirmed", None);
    // Confirmation only makes sense from pending; a cancelled or already
    // confirmed order keeps its status, the paid payment is still
    // recorded.
    if order.status() == OrderStatus::Pending {
        order.set_status(
            OrderStatus::Confirmed,
            Some("Payment confirmed".to_string()),
            None,
        )?;
    }
    Ok(true)
}

/// Records a failed payment. Returns false on duplicate replay.
fn apply_failure(
    order: &mut Order,
    transaction_id: Option<String>,
    raw: serde_json::Value,
    failure_message: Option<String>,
) -> bool {
    if !order.update_payment(PaymentStatus::Failed, transaction_id, Some(raw)) {
        return false;
    }

    let message = failure_message.unwrap_or_else(|| "Payment declined".to_string());
    order.append_timeline("payment_failed", format!("Payment failed: {message}"), None);
    true
}
