//! Inventory ledger: check, reserve, and release variant stock.

use std::sync::Arc;
use std::time::Duration;

use common::ProductId;
use store::{ProductStore, StoreError};

/// Bounded retry budget for transient storage failures. Anything past
/// this surfaces to the caller instead of hanging.
const MAX_ATTEMPTS: u32 = 3;

/// Result of an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub stock: u32,
}

/// Thin service over [`ProductStore`] owning all stock mutation.
///
/// Reservations delegate to the store's atomic conditional decrement, so
/// two concurrent orders racing for the last unit can never both
/// succeed. Transient I/O failures are retried a bounded number of
/// times with a short backoff.
pub struct InventoryLedger<P> {
    products: Arc<P>,
}

impl<P> Clone for InventoryLedger<P> {
    fn clone(&self) -> Self {
        Self {
            products: self.products.clone(),
        }
    }
}

impl<P: ProductStore> InventoryLedger<P> {
    /// Creates a ledger over the given product store.
    pub fn new(products: Arc<P>) -> Self {
        Self { products }
    }

    /// Reads a variant's stock. Fails when the product or variant is
    /// unknown.
    pub async fn check_available(
        &self,
        product_id: ProductId,
        size: &str,
    ) -> Result<Availability, StoreError> {
        let stock = self.products.stock(product_id, size).await?;
        Ok(Availability {
            available: stock > 0,
            stock,
        })
    }

    /// Decrements a variant's stock by `quantity`, all or nothing.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.with_retry(|| self.products.reserve_stock(product_id, size, quantity))
            .await
    }

    /// Increments a variant's stock by `quantity` (compensation for a
    /// cancelled reservation).
    #[tracing::instrument(skip(self))]
    pub async fn release(
        &self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.with_retry(|| self.products.release_stock(product_id, size, quantity))
            .await
    }

    async fn with_retry<F, Fut>(&self, op: F) -> Result<(), StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(error = %e, attempt, "transient store error, retrying");
                    tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Money, Product, Variant};
    use store::InMemoryProductStore;

    async fn seeded_ledger(stock: u32) -> (InventoryLedger<InMemoryProductStore>, ProductId) {
        let store = Arc::new(InMemoryProductStore::new());
        let product = Product {
            id: ProductId::new(),
            name: "Pijama Estrelas".to_string(),
            price: Money::from_cents(5990),
            is_active: true,
            images: vec![],
            variants: vec![Variant {
                size: "M".to_string(),
                stock,
                sku: "PE-M".to_string(),
            }],
        };
        store.insert(&product).await.unwrap();
        (InventoryLedger::new(store), product.id)
    }

    #[tokio::test]
    async fn check_reports_stock() {
        let (ledger, id) = seeded_ledger(4).await;
        let availability = ledger.check_available(id, "M").await.unwrap();
        assert!(availability.available);
        assert_eq!(availability.stock, 4);
    }

    #[tokio::test]
    async fn check_unknown_variant_fails() {
        let (ledger, id) = seeded_ledger(4).await;
        let result = ledger.check_available(id, "GG").await;
        assert!(matches!(result, Err(StoreError::VariantNotFound { .. })));
    }

    #[tokio::test]
    async fn reserve_then_release_restores_stock() {
        let (ledger, id) = seeded_ledger(4).await;
        ledger.reserve(id, "M", 3).await.unwrap();
        assert_eq!(ledger.check_available(id, "M").await.unwrap().stock, 1);

        ledger.release(id, "M", 3).await.unwrap();
        assert_eq!(ledger.check_available(id, "M").await.unwrap().stock, 4);
    }

    #[tokio::test]
    async fn reserve_does_not_clamp() {
        let (ledger, id) = seeded_ledger(2).await;
        let result = ledger.reserve(id, "M", 3).await;
        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
        assert_eq!(ledger.check_available(id, "M").await.unwrap().stock, 2);
    }
}
