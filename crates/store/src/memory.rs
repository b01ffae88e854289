//! In-memory store implementations for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use common::{OrderId, ProductId};
use domain::{Order, Product};
use tokio::sync::RwLock;

use crate::{
    OrderFilter, OrderStore, Page, ProductStore, Result, StoreError,
};

/// In-memory order store.
///
/// Provides the same interface and concurrency behavior as the PostgreSQL
/// implementation: whole-document writes with a version check.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id()) {
            return Err(StoreError::DuplicateOrder(order.id().to_string()));
        }
        if orders
            .values()
            .any(|o| o.order_number() == order.order_number())
        {
            return Err(StoreError::DuplicateOrder(
                order.order_number().to_string(),
            ));
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn update(&self, order: &mut Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        let stored = orders
            .get(&order.id())
            .ok_or(StoreError::OrderNotFound(order.id()))?;

        if stored.version() != order.version() {
            return Err(StoreError::VersionConflict {
                order_id: order.id(),
                expected: order.version(),
                actual: stored.version(),
            });
        }

        order.set_version(order.version() + 1);
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.order_number().as_str() == order_number)
            .cloned())
    }

    async fn list(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<Order>, u64)> {
        let orders = self.orders.read().await;
        let mut matches: Vec<Order> = orders
            .values()
            .filter(|o| {
                filter.status.is_none_or(|s| o.status() == s)
                    && filter.customer.is_none_or(|c| o.customer() == c)
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .collect();
        Ok((items, total))
    }

    async fn next_order_sequence(&self) -> Result<u64> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// In-memory product store.
///
/// Stock decrements run under a single write lock, matching the atomicity
/// of the conditional UPDATE in the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryProductStore {
    /// Creates a new empty in-memory product store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn insert(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(StoreError::DuplicateProduct(product.id));
        }
        if let Some(taken) = products.values().flat_map(|p| &p.variants).find(|v| {
            product
                .variants
                .iter()
                .any(|candidate| candidate.sku == v.sku)
        }) {
            return Err(StoreError::DuplicateSku(taken.sku.clone()));
        }
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn stock(&self, product_id: ProductId, size: &str) -> Result<u32> {
        let products = self.products.read().await;
        let product = products
            .get(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        let variant = product
            .variant(size)
            .ok_or_else(|| StoreError::VariantNotFound {
                product_id,
                size: size.to_string(),
            })?;
        Ok(variant.stock)
    }

    async fn reserve_stock(
        &self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        let variant = product
            .variants
            .iter_mut()
            .find(|v| v.size == size)
            .ok_or_else(|| StoreError::VariantNotFound {
                product_id,
                size: size.to_string(),
            })?;

        if variant.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                size: size.to_string(),
                requested: quantity,
                available: variant.stock,
            });
        }

        variant.stock -= quantity;
        Ok(())
    }

    async fn release_stock(
        &self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        let variant = product
            .variants
            .iter_mut()
            .find(|v| v.size == size)
            .ok_or_else(|| StoreError::VariantNotFound {
                product_id,
                size: size.to_string(),
            })?;

        variant.stock += quantity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use domain::{
        CustomerInfo, LineItem, Money, NewOrder, OrderNumber, OrderStatus, PaymentMethod,
        PricingPolicy, ShippingAddress, Variant,
    };

    fn sample_product(stock: u32) -> Product {
        Product {
            id: ProductId::new(),
            name: "Camiseta Dino".to_string(),
            price: Money::from_cents(3990),
            is_active: true,
            images: vec![],
            variants: vec![Variant {
                size: "G".to_string(),
                stock,
                sku: format!("CD-G-{}", ProductId::new()),
            }],
        }
    }

    fn sample_order(sequence: u64) -> Order {
        let line_items = vec![LineItem {
            product_id: ProductId::new(),
            name: "Camiseta Dino".to_string(),
            unit_price: Money::from_cents(3990),
            quantity: 1,
            size: "G".to_string(),
            color: "verde".to_string(),
            sku: "CD-G-VD".to_string(),
            image_url: None,
        }];
        let pricing = PricingPolicy::default()
            .quote(&line_items, Money::zero(), Money::zero())
            .unwrap();
        Order::create(NewOrder {
            order_number: OrderNumber::from_sequence(sequence),
            customer: UserId::new(),
            customer_info: CustomerInfo {
                name: "Bruno Lima".to_string(),
                email: "bruno@example.com".to_string(),
                phone: "+55 21 98888-0000".to_string(),
                tax_id: None,
            },
            line_items,
            pricing,
            shipping_address: ShippingAddress {
                street: "Av. Atlântica".to_string(),
                number: "500".to_string(),
                complement: None,
                neighborhood: "Copacabana".to_string(),
                city: "Rio de Janeiro".to_string(),
                state: "RJ".to_string(),
                zip_code: "22000-000".to_string(),
                country: "Brasil".to_string(),
            },
            payment_method: PaymentMethod::CreditCard,
            customer_note: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_order() {
        let store = InMemoryOrderStore::new();
        let order = sample_order(1);

        store.insert(&order).await.unwrap();
        let loaded = store.get(order.id()).await.unwrap().unwrap();
        assert_eq!(loaded.id(), order.id());
        assert_eq!(loaded.order_number(), order.order_number());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_order_number() {
        let store = InMemoryOrderStore::new();
        let order = sample_order(7);
        let twin = sample_order(7);

        store.insert(&order).await.unwrap();
        let result = store.insert(&twin).await;
        assert!(matches!(result, Err(StoreError::DuplicateOrder(_))));
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order(1);
        store.insert(&order).await.unwrap();

        order
            .set_status(OrderStatus::Confirmed, None, None)
            .unwrap();
        store.update(&mut order).await.unwrap();
        assert_eq!(order.version(), 1);

        let loaded = store.get(order.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), OrderStatus::Confirmed);
        assert_eq!(loaded.version(), 1);
    }

    #[tokio::test]
    async fn update_detects_version_conflict() {
        let store = InMemoryOrderStore::new();
        let order = sample_order(1);
        store.insert(&order).await.unwrap();

        // Two copies loaded at version 0.
        let mut first = store.get(order.id()).await.unwrap().unwrap();
        let mut second = store.get(order.id()).await.unwrap().unwrap();

        first
            .set_status(OrderStatus::Confirmed, None, None)
            .unwrap();
        store.update(&mut first).await.unwrap();

        second
            .set_status(OrderStatus::Cancelled, None, None)
            .unwrap();
        let result = store.update(&mut second).await;
        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
    }

    #[tokio::test]
    async fn get_by_number() {
        let store = InMemoryOrderStore::new();
        let order = sample_order(42);
        store.insert(&order).await.unwrap();

        let loaded = store.get_by_number("PM-000042").await.unwrap().unwrap();
        assert_eq!(loaded.id(), order.id());
        assert!(store.get_by_number("PM-999999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_customer_and_status() {
        let store = InMemoryOrderStore::new();
        let mine = sample_order(1);
        let other = sample_order(2);
        store.insert(&mine).await.unwrap();
        store.insert(&other).await.unwrap();

        let (items, total) = store
            .list(&OrderFilter::for_customer(mine.customer()), Page::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id(), mine.id());

        let filter = OrderFilter::default().with_status(OrderStatus::Shipped);
        let (items, total) = store.list(&filter, Page::default()).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn sequence_is_monotonic() {
        let store = InMemoryOrderStore::new();
        let a = store.next_order_sequence().await.unwrap();
        let b = store.next_order_sequence().await.unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[tokio::test]
    async fn reserve_decrements_stock() {
        let store = InMemoryProductStore::new();
        let product = sample_product(5);
        store.insert(&product).await.unwrap();

        store.reserve_stock(product.id, "G", 2).await.unwrap();
        assert_eq!(store.stock(product.id, "G").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reserve_never_partially_takes() {
        let store = InMemoryProductStore::new();
        let product = sample_product(1);
        store.insert(&product).await.unwrap();

        let result = store.reserve_stock(product.id, "G", 2).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
        // Counter untouched.
        assert_eq!(store.stock(product.id, "G").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn release_restores_stock() {
        let store = InMemoryProductStore::new();
        let product = sample_product(5);
        store.insert(&product).await.unwrap();

        store.reserve_stock(product.id, "G", 5).await.unwrap();
        store.release_stock(product.id, "G", 5).await.unwrap();
        assert_eq!(store.stock(product.id, "G").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn unknown_variant_is_reported() {
        let store = InMemoryProductStore::new();
        let product = sample_product(5);
        store.insert(&product).await.unwrap();

        let result = store.reserve_stock(product.id, "GG", 1).await;
        assert!(matches!(result, Err(StoreError::VariantNotFound { .. })));

        let result = store.stock(ProductId::new(), "G").await;
        assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_reservations_never_oversell() {
        let store = InMemoryProductStore::new();
        let product = sample_product(1);
        store.insert(&product).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let id = product.id;
            handles.push(tokio::spawn(async move {
                store.reserve_stock(id, "G", 1).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(store.stock(product.id, "G").await.unwrap(), 0);
    }
}
