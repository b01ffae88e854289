use common::{OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An optimistic-concurrency check failed on an order update.
    #[error(
        "concurrent modification of order {order_id}: expected version {expected}, found {actual}"
    )]
    VersionConflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    /// The order was not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order id or number already exists.
    #[error("order already exists: {0}")]
    DuplicateOrder(String),

    /// The product was not found.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product id already exists.
    #[error("product already exists: {0}")]
    DuplicateProduct(ProductId),

    /// A SKU is already taken by another variant.
    #[error("sku already exists: {0}")]
    DuplicateSku(String),

    /// The (product, size) variant was not found.
    #[error("variant not found: product {product_id} size {size}")]
    VariantNotFound { product_id: ProductId, size: String },

    /// A conditional stock decrement found fewer units than requested.
    /// The counter is left untouched.
    #[error(
        "insufficient stock for product {product_id} size {size}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        size: String,
        requested: u32,
        available: u32,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for transient I/O failures that are safe to retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Database(sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
