//! Events emitted for notification and observability collaborators.
//!
//! Downstream consumers (e-mail notifications, dashboards) subscribe to
//! the structured log stream; delivering them anywhere else is out of
//! scope here.

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{OrderStatus, PaymentStatus};
use serde::Serialize;

/// An event describing a change to an order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StorefrontEvent {
    OrderCreated {
        order_id: OrderId,
        order_number: String,
        new_status: OrderStatus,
        timestamp: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: OrderId,
        order_number: String,
        previous_status: OrderStatus,
        new_status: OrderStatus,
        timestamp: DateTime<Utc>,
    },
    PaymentRecorded {
        order_id: OrderId,
        order_number: String,
        payment_status: PaymentStatus,
        timestamp: DateTime<Utc>,
    },
}

/// Emits an event on the structured log stream.
pub fn emit(event: &StorefrontEvent) {
    match serde_json::to_string(event) {
        Ok(payload) => {
            tracing::info!(target: "storefront::events", %payload, "event emitted");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let event = StorefrontEvent::OrderCreated {
            order_id: OrderId::new(),
            order_number: "PM-000001".to_string(),
            new_status: OrderStatus::Pending,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order-created");
        assert_eq!(json["new_status"], "pending");
    }
}
