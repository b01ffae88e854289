//! Persistence layer for the storefront.
//!
//! Defines the [`OrderStore`] and [`ProductStore`] traits plus two
//! implementations: an in-memory store for tests and local development,
//! and a PostgreSQL store for production. The atomic primitives the
//! order core relies on live here: versioned compare-and-swap order
//! writes, conditional stock decrements, and the order-number sequence.

mod error;
mod memory;
mod order_store;
mod postgres;
mod product_store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryOrderStore, InMemoryProductStore};
pub use order_store::{OrderFilter, OrderStore, Page};
pub use postgres::{PostgresOrderStore, PostgresProductStore};
pub use product_store::ProductStore;
