//! Load-mutate-update helper with bounded optimistic retry.

use common::OrderId;
use domain::Order;
use store::{OrderStore, StoreError};

use crate::{CheckoutError, Result};

/// Retry budget for optimistic-concurrency conflicts.
const MAX_CAS_ATTEMPTS: u32 = 3;

/// Loads the order, applies `mutate`, and persists it with the store's
/// compare-and-swap. On a version conflict the order is reloaded and the
/// mutation re-applied, a bounded number of times.
///
/// `mutate` returns whether the order actually changed; an unchanged
/// order (idempotent replay) is returned without a write.
pub(crate) async fn update_with_retry<O, F>(
    orders: &O,
    order_id: OrderId,
    mut mutate: F,
) -> Result<Order>
where
    O: OrderStore,
    F: FnMut(&mut Order) -> Result<bool>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;

        let mut order = orders
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if !mutate(&mut order)? {
            return Ok(order);
        }

        match orders.update(&mut order).await {
            Ok(()) => return Ok(order),
            Err(StoreError::VersionConflict { .. }) if attempts < MAX_CAS_ATTEMPTS => {
                tracing::debug!(%order_id, attempts, "version conflict, reloading");
            }
            Err(e) => return Err(e.into()),
        }
    }
}
