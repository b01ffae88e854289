//! Order and payment state machines.

use serde::{Deserialize, Serialize};

/// Fulfillment status of an order.
///
/// Allowed transitions:
/// ```text
/// pending ──► confirmed ──► processing ──► shipped ──► delivered
///    │            │              │            │
///    │            │              │            └──► returned
///    └────────────┴──────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order placed, awaiting payment confirmation.
    #[default]
    Pending,

    /// Payment confirmed.
    Confirmed,

    /// Order is being prepared for shipment.
    Processing,

    /// Order handed to the carrier.
    Shipped,

    /// Order delivered (terminal).
    Delivered,

    /// Order cancelled (terminal).
    Cancelled,

    /// Order returned after shipment (terminal).
    Returned,
}

impl OrderStatus {
    /// Returns true if the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Returned)
        )
    }

    /// Returns true if customer-facing cancellation is still permitted.
    ///
    /// Shipped or delivered orders go through the return flow instead.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Returned
        )
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "returned" => Ok(OrderStatus::Returned),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Payment sub-state of an order, tracked independently of fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    CreditCard,
    Pix,
    MercadoPago,
    PagSeguro,
    Boleto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit-card",
            PaymentMethod::Pix => "pix",
            PaymentMethod::MercadoPago => "mercado-pago",
            PaymentMethod::PagSeguro => "pagseguro",
            PaymentMethod::Boleto => "boleto",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit-card" => Ok(PaymentMethod::CreditCard),
            "pix" => Ok(PaymentMethod::Pix),
            "mercado-pago" => Ok(PaymentMethod::MercadoPago),
            "pagseguro" => Ok(PaymentMethod::PagSeguro),
            "boleto" => Ok(PaymentMethod::Boleto),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}
