//! Order aggregate and related types.

mod aggregate;
mod state;
mod value_objects;

pub use aggregate::{NewOrder, Order};
pub use state::{OrderStatus, PaymentMethod, PaymentStatus};
pub use value_objects::{
    CustomerInfo, LineItem, OrderNotes, OrderNumber, PaymentInfo, ProviderArtifacts, Refund,
    RefundStatus, ShippingAddress, TimelineEntry, TrackingInfo,
};

use thiserror::Error;

use crate::Money;

/// Errors that can occur during order aggregate operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested status change is not allowed by the state machine.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Order has no line items.
    #[error("order has no line items")]
    EmptyOrder,

    /// A line item has a zero quantity.
    #[error("invalid quantity {quantity} for sku {sku}")]
    InvalidQuantity { sku: String, quantity: u32 },

    /// A line item has a non-positive unit price.
    #[error("invalid unit price {price} for sku {sku}")]
    InvalidPrice { sku: String, price: i64 },

    /// The pricing block does not satisfy
    /// `total = subtotal + shipping - discount + tax` or its subtotal does
    /// not match the line items.
    #[error("pricing block is inconsistent with line items")]
    InvalidPricing,

    /// Refunds are only possible for paid orders.
    #[error("refund not allowed while payment status is {payment_status}")]
    RefundNotAllowed { payment_status: PaymentStatus },

    /// An order carries at most one refund record.
    #[error("refund already requested")]
    RefundAlreadyRequested,

    /// Refund amount must be positive and within the order total.
    #[error("invalid refund amount {amount} for order total {total}")]
    InvalidRefundAmount { amount: Money, total: Money },
}
