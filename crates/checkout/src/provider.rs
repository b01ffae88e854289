//! Payment provider adapter boundary.
//!
//! Every gateway (credit card, PIX, Mercado Pago, PagSeguro) is driven
//! through the single [`PaymentProvider::attempt`] contract; wire
//! formats and timing are entirely the adapter's concern. The
//! reconciliation service never depends on a specific adapter's
//! response shape.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Order, PaymentMethod, ProviderArtifacts};

use crate::{CheckoutError, Result};

/// Opaque method-specific input (card token, sender hash, ...),
/// forwarded to the adapter untouched.
pub type ProviderInput = serde_json::Value;

/// How an attempt resolved at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Asynchronous method: artifacts issued, confirmation arrives later
    /// through a provider callback.
    Pending,
    /// Payment approved synchronously.
    Approved,
    /// Payment declined synchronously.
    Declined { message: String },
}

/// Adapter response for one payment attempt.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub transaction_id: Option<String>,
    pub outcome: AttemptOutcome,
    /// Method-specific artifacts (PIX code/QR, boleto URL/code).
    pub artifacts: ProviderArtifacts,
    /// Raw provider payload, stored opaquely on the order.
    pub raw: serde_json::Value,
}

/// Abstract payment gateway adapter.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Submits a payment attempt for the order.
    ///
    /// A declined payment is a successful call with
    /// [`AttemptOutcome::Declined`]; `Err` means the adapter itself
    /// failed (transport fault, bad credentials, ...).
    async fn attempt(&self, order: &Order, input: &ProviderInput) -> Result<ProviderResponse>;
}

/// Maps payment methods to their adapters.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter for a method, replacing any existing one.
    pub fn register(&mut self, method: PaymentMethod, provider: Arc<dyn PaymentProvider>) {
        self.providers.insert(method, provider);
    }

    /// Looks up the adapter for a method.
    pub fn get(&self, method: PaymentMethod) -> Result<&Arc<dyn PaymentProvider>> {
        self.providers
            .get(&method)
            .ok_or(CheckoutError::UnsupportedMethod(method))
    }
}

#[derive(Debug, Default)]
struct MockProviderState {
    next_id: u32,
    decline_next: bool,
    fail_next: bool,
}

/// In-memory payment provider for tests and local development.
///
/// Synchronous methods (credit card, Mercado Pago, PagSeguro) resolve
/// immediately; PIX and boleto issue artifacts and stay pending until a
/// simulated callback.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentProvider {
    state: Arc<RwLock<MockProviderState>>,
}

impl MockPaymentProvider {
    /// Creates a new mock provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to decline the next attempt.
    pub fn set_decline_next(&self, decline: bool) {
        self.state.write().unwrap().decline_next = decline;
    }

    /// Configures the provider to fail (transport error) on the next
    /// attempt.
    pub fn set_fail_next(&self, fail: bool) {
        self.state.write().unwrap().fail_next = fail;
    }

    /// Returns the number of attempts processed so far.
    pub fn attempt_count(&self) -> u32 {
        self.state.read().unwrap().next_id
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn attempt(&self, order: &Order, _input: &ProviderInput) -> Result<ProviderResponse> {
        let mut state = self.state.write().unwrap();

        if state.fail_next {
            state.fail_next = false;
            return Err(CheckoutError::ProviderFailure(
                "gateway unreachable".to_string(),
            ));
        }

        state.next_id += 1;
        let transaction_id = format!("TX-{:06}", state.next_id);

        if state.decline_next {
            state.decline_next = false;
            return Ok(ProviderResponse {
                transaction_id: Some(transaction_id),
                outcome: AttemptOutcome::Declined {
                    message: "card declined".to_string(),
                },
                artifacts: ProviderArtifacts::default(),
                raw: serde_json::json!({ "approved": false, "error_code": "CARD_DECLINED" }),
            });
        }

        let method = order.payment().method;
        let response = match method {
            PaymentMethod::Pix => ProviderResponse {
                transaction_id: Some(transaction_id.clone()),
                outcome: AttemptOutcome::Pending,
                artifacts: ProviderArtifacts {
                    pix_code: Some(format!(
                        "00020126580014BR.GOV.BCB.PIX0136{}6304{:04}",
                        order.order_number(),
                        state.next_id
                    )),
                    pix_qr_code: Some(format!("data:image/png;base64,QR-{transaction_id}")),
                    ..ProviderArtifacts::default()
                },
                raw: serde_json::json!({ "issued": true, "transaction_id": transaction_id }),
            },
            PaymentMethod::Boleto => ProviderResponse {
                transaction_id: Some(transaction_id.clone()),
                outcome: AttemptOutcome::Pending,
                artifacts: ProviderArtifacts {
                    boleto_url: Some(format!(
                        "https://boleto.example.com/{transaction_id}"
                    )),
                    boleto_code: Some(format!("34191.{:05} 00000.000000", state.next_id)),
                    ..ProviderArtifacts::default()
                },
                raw: serde_json::json!({ "issued": true, "transaction_id": transaction_id }),
            },
            PaymentMethod::CreditCard | PaymentMethod::MercadoPago | PaymentMethod::PagSeguro => {
                ProviderResponse {
                    transaction_id: Some(transaction_id.clone()),
                    outcome: AttemptOutcome::Approved,
                    artifacts: ProviderArtifacts::default(),
                    raw: serde_json::json!({
                        "approved": true,
                        "transaction_id": transaction_id,
                        "method": method.as_str(),
                    }),
                }
            }
        };

        Ok(response)
    }
}

/// Registers the mock provider for every supported method.
pub fn mock_registry() -> (ProviderRegistry, MockPaymentProvider) {
    let provider = MockPaymentProvider::new();
    let mut registry = ProviderRegistry::new();
    for method in [
        PaymentMethod::CreditCard,
        PaymentMethod::Pix,
        PaymentMethod::MercadoPago,
        PaymentMethod::PagSeguro,
        PaymentMethod::Boleto,
    ] {
        registry.register(method, Arc::new(provider.clone()));
    }
    (registry, provider)
}
