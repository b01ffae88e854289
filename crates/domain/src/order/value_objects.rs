//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::Money;

use super::{PaymentMethod, PaymentStatus};

/// Human-readable order number, assigned once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Formats a store-allocated sequence value as an order number.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("PM-{sequence:06}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A line in an order: a frozen copy of product data at purchase time.
///
/// Product price or name changes after placement never alter this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub size: String,
    pub color: String,
    pub sku: String,
    pub image_url: Option<String>,
}

impl LineItem {
    /// Returns `unit_price × quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Customer contact data captured at order time, decoupled from the live
/// user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}

fn default_country() -> String {
    "Brasil".to_string()
}

/// Structured delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

/// One entry in the order's append-only audit timeline.
///
/// `status` is a label, not restricted to `OrderStatus` values: payment
/// reconciliation appends `payment_pending` / `payment_confirmed` /
/// `payment_failed` entries alongside fulfillment-status entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<UserId>,
}

impl TimelineEntry {
    pub fn new(status: impl Into<String>, message: impl Into<String>, actor: Option<UserId>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            timestamp: Utc::now(),
            actor,
        }
    }
}

/// Method-specific payment artifacts returned by a provider adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boleto_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boleto_code: Option<String>,
}

impl ProviderArtifacts {
    pub fn is_empty(&self) -> bool {
        self.pix_code.is_none()
            && self.pix_qr_code.is_none()
            && self.boleto_url.is_none()
            && self.boleto_code.is_none()
    }
}

/// Payment sub-state of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<DateTime<Utc>>,
    /// Raw provider response, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
    #[serde(flatten)]
    pub artifacts: ProviderArtifacts,
}

impl PaymentInfo {
    /// Creates the initial payment record for a freshly placed order.
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            payment_date: None,
            provider_response: None,
            artifacts: ProviderArtifacts::default(),
        }
    }
}

/// Carrier tracking data, set when an order ships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Free-form notes attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<String>,
}

/// Status of a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
}

/// Refund record attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, cents: i64) -> LineItem {
        LineItem {
            product_id: ProductId::new(),
            name: "Body Manga Curta".to_string(),
            unit_price: Money::from_cents(cents),
            quantity,
            size: "M".to_string(),
            color: "azul".to_string(),
            sku: "BMC-M-AZ".to_string(),
            image_url: None,
        }
    }

    #[test]
    fn order_number_format() {
        assert_eq!(OrderNumber::from_sequence(42).as_str(), "PM-000042");
        assert_eq!(OrderNumber::from_sequence(123456).as_str(), "PM-123456");
    }

    #[test]
    fn line_total() {
        assert_eq!(line(3, 1000).line_total().cents(), 3000);
    }

    #[test]
    fn shipping_address_defaults_country() {
        let json = serde_json::json!({
            "street": "Rua das Flores",
            "number": "100",
            "neighborhood": "Centro",
            "city": "São Paulo",
            "state": "SP",
            "zip_code": "01000-000"
        });
        let addr: ShippingAddress = serde_json::from_value(json).unwrap();
        assert_eq!(addr.country, "Brasil");
    }

    #[test]
    fn payment_info_starts_pending() {
        let payment = PaymentInfo::new(PaymentMethod::Pix);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.transaction_id.is_none());
        assert!(payment.artifacts.is_empty());
    }

    #[test]
    fn line_item_serialization_roundtrip() {
        let item = line(2, 4990);
        let json = serde_json::to_string(&item).unwrap();
        let back: LineItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn artifacts_flatten_into_payment() {
        let mut payment = PaymentInfo::new(PaymentMethod::Pix);
        payment.artifacts.pix_code = Some("00020126...".to_string());
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["pix_code"], "00020126...");
    }
}
