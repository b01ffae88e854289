//! Product persistence trait with atomic stock primitives.

use async_trait::async_trait;
use common::ProductId;
use domain::Product;

use crate::Result;

/// Core trait for product persistence.
///
/// Stock mutation happens only through [`reserve_stock`] and
/// [`release_stock`]; both must be atomic with respect to concurrent
/// callers. In particular `reserve_stock` is a conditional decrement —
/// it either takes the full quantity or takes nothing, so two orders
/// racing for the last unit can never both succeed.
///
/// [`reserve_stock`]: ProductStore::reserve_stock
/// [`release_stock`]: ProductStore::release_stock
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Persists a product (catalog seeding and tests). Rejects duplicate
    /// product ids and already-taken SKUs.
    async fn insert(&self, product: &Product) -> Result<()>;

    /// Loads a product by id. Returns None if absent.
    async fn get(&self, id: ProductId) -> Result<Option<Product>>;

    /// Reads the current stock counter of a variant.
    ///
    /// Fails with `ProductNotFound` / `VariantNotFound` when unknown.
    async fn stock(&self, product_id: ProductId, size: &str) -> Result<u32>;

    /// Atomically decrements a variant's stock by `quantity`, only if at
    /// least `quantity` units are available. Never clamps and never
    /// partially reserves: on `InsufficientStock` the counter is
    /// unchanged.
    async fn reserve_stock(&self, product_id: ProductId, size: &str, quantity: u32) -> Result<()>;

    /// Increments a variant's stock by `quantity` (compensating action
    /// for cancellations).
    async fn release_stock(&self, product_id: ProductId, size: &str, quantity: u32) -> Result<()>;
}
