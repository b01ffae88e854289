//! Service-level error taxonomy.

use common::{OrderId, ProductId};
use domain::{Money, OrderError, PaymentMethod, PricingError};
use store::StoreError;
use thiserror::Error;

/// One cart line that could not be covered by available stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortage {
    pub product_id: ProductId,
    pub name: String,
    pub size: String,
    pub requested: u32,
    pub available: u32,
}

impl std::fmt::Display for StockShortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\"{}\" size {}: requested {}, available {}",
            self.name, self.size, self.requested, self.available
        )
    }
}

/// All shortages found while validating a cart, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortages(pub Vec<StockShortage>);

impl std::fmt::Display for StockShortages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for shortage in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{shortage}")?;
            first = false;
        }
        Ok(())
    }
}

/// Errors returned from the lifecycle and reconciliation services.
///
/// Business-rule rejections are always typed; callers never see them as
/// unhandled faults.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The order was not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// A referenced product is unknown or inactive.
    #[error("product not found or inactive: {0}")]
    ProductNotFound(ProductId),

    /// A referenced (product, size) variant is unknown.
    #[error("variant not found: product {product_id} size {size}")]
    VariantNotFound { product_id: ProductId, size: String },

    /// The caller is not allowed to perform the operation.
    #[error("access denied: {0}")]
    Forbidden(String),

    /// One or more cart lines exceed available stock. Nothing was
    /// reserved.
    #[error("insufficient stock: {0}")]
    InsufficientStock(StockShortages),

    /// An aggregate invariant rejected the operation, including illegal
    /// status transitions.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Pricing computation rejected the cart.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The submitted payment amount does not match the order total.
    #[error("payment amount {submitted} does not match order total {expected}")]
    AmountMismatch { expected: Money, submitted: Money },

    /// The payment adapter failed to process the attempt (transport or
    /// adapter fault, distinct from a declined payment).
    #[error("payment provider failure: {0}")]
    ProviderFailure(String),

    /// No adapter is registered for the requested payment method.
    #[error("no payment provider registered for method {0}")]
    UnsupportedMethod(PaymentMethod),

    /// A storage error that was not recovered by the bounded retry
    /// policy.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Maps a store-level stock failure for one line into the service
    /// taxonomy.
    pub(crate) fn from_stock_error(err: StoreError, name: &str) -> Self {
        match err {
            StoreError::InsufficientStock {
                product_id,
                size,
                requested,
                available,
            } => CheckoutError::InsufficientStock(StockShortages(vec![StockShortage {
                product_id,
                name: name.to_string(),
                size,
                requested,
                available,
            }])),
            StoreError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
            StoreError::VariantNotFound { product_id, size } => {
                CheckoutError::VariantNotFound { product_id, size }
            }
            other => CheckoutError::Store(other),
        }
    }
}

/// Result type for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
