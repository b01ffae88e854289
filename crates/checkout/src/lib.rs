//! Order lifecycle, inventory, and payment reconciliation services.
//!
//! This crate orchestrates the storefront's only real invariants:
//! - no overselling: reservations are all-or-nothing and backed by the
//!   store's atomic conditional decrement
//! - auditable status history: every status change lands with exactly
//!   one timeline entry in a single document write
//! - idempotent payment reconciliation keyed on provider transaction ids

mod auth;
mod cas;
mod error;
mod events;
mod inventory;
mod lifecycle;
mod provider;
mod reconciliation;

pub use auth::{require_owner_or_admin, require_role};
pub use error::{CheckoutError, Result, StockShortage, StockShortages};
pub use events::StorefrontEvent;
pub use inventory::{Availability, InventoryLedger};
pub use lifecycle::{CartLine, OrderLifecycle, PlaceOrder};
pub use provider::{
    AttemptOutcome, MockPaymentProvider, PaymentProvider, ProviderInput, ProviderRegistry,
    ProviderResponse, mock_registry,
};
pub use reconciliation::{PaymentOutcome, PaymentReconciliation};
