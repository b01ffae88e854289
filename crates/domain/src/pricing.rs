//! Pricing engine: subtotal, shipping, and total computation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Money;
use crate::order::LineItem;

/// Errors produced while computing order pricing.
#[derive(Debug, Error)]
pub enum PricingError {
    /// The computed total came out negative, e.g. a discount larger than
    /// the goods being discounted. Rejected rather than clamped.
    #[error("invalid pricing: total would be {total} (discount {discount} exceeds charges)")]
    NegativeTotal { total: Money, discount: Money },
}

/// Store-wide pricing rules. Values come from configuration, not code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Orders with subtotal at or above this ship free.
    pub free_shipping_threshold: Money,
    /// Flat fee charged below the threshold.
    pub shipping_fee: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_reais(150),
            shipping_fee: Money::from_reais(15),
        }
    }
}

/// Price breakdown of an order, frozen at placement time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub subtotal: Money,
    pub shipping: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl Pricing {
    /// Checks the pricing identity: `total = subtotal + shipping - discount + tax`
    /// with every component non-negative.
    pub fn verify(&self) -> bool {
        !self.subtotal.is_negative()
            && !self.shipping.is_negative()
            && !self.discount.is_negative()
            && !self.tax.is_negative()
            && !self.total.is_negative()
            && self.total == self.subtotal + self.shipping - self.discount + self.tax
    }
}

impl PricingPolicy {
    /// Sums `unit_price × quantity` over all lines.
    pub fn subtotal(&self, lines: &[LineItem]) -> Money {
        lines.iter().map(LineItem::line_total).sum()
    }

    /// Flat fee below the free-shipping threshold, zero at or above it.
    pub fn shipping(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_shipping_threshold {
            Money::zero()
        } else {
            self.shipping_fee
        }
    }

    /// Computes the full price breakdown for a set of lines.
    pub fn quote(
        &self,
        lines: &[LineItem],
        discount: Money,
        tax: Money,
    ) -> Result<Pricing, PricingError> {
        let subtotal = self.subtotal(lines);
        let shipping = self.shipping(subtotal);
        let total = subtotal + shipping - discount + tax;

        if total.is_negative() {
            return Err(PricingError::NegativeTotal { total, discount });
        }

        Ok(Pricing {
            subtotal,
            shipping,
            discount,
            tax,
            total,
        })
    }
}
