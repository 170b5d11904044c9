//! End-to-end checkout flow tests over in-memory fakes.
//!
//! These exercise the whole pipeline: cart mutation, pre-checkout
//! validation, order submission, the gateway handoff, and post-redirect
//! reconciliation, asserting the durable state (cart + correlation) at each
//! boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use madrona_core::{
    AddressId, CurrencyCode, ExternalOrderId, OrderId, OrderStatus, ProductId,
};
use rust_decimal::Decimal;

use madrona_checkout::cart::{AddItemRequest, CartStore, CartValidator};
use madrona_checkout::catalog::{CatalogSource, Product, PublishStatus};
use madrona_checkout::http::ApiError;
use madrona_checkout::orders::{
    AddressRefs, CreateOrderRequest, Order, OrderApi, OrderSummary, PaymentMethod,
};
use madrona_checkout::payment::gateway::{
    GatewayCapture, GatewayOrder, GatewayOrderDetails, PaymentGateway,
};
use madrona_checkout::payment::{PaymentGatewayBridge, PaymentOutcome, PaymentReconciler};
use madrona_checkout::storage::{KeyValueStore, MemoryStore, keys};
use madrona_checkout::CheckoutError;

// ============================================================================
// Fakes
// ============================================================================

struct FakeCatalog {
    products: HashMap<ProductId, Product>,
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, ApiError> {
        Ok(self.products.get(id).cloned())
    }
}

/// Order backend that creates orders in memory and replays a scripted
/// sequence of statuses on reads. The last scripted status repeats.
#[derive(Clone)]
struct FakeBackend {
    created: Arc<Mutex<Option<Order>>>,
    status_script: Arc<Mutex<Vec<OrderStatus>>>,
    fetches: Arc<AtomicU32>,
    fail_creation: bool,
}

impl FakeBackend {
    fn new(status_script: Vec<OrderStatus>) -> Self {
        Self {
            created: Arc::new(Mutex::new(None)),
            status_script: Arc::new(Mutex::new(status_script)),
            fetches: Arc::new(AtomicU32::new(0)),
            fail_creation: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail_creation: true,
            ..Self::new(vec![])
        }
    }

    fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderApi for FakeBackend {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ApiError> {
        if self.fail_creation {
            return Err(ApiError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "backend unavailable".to_string(),
            });
        }
        let order = Order {
            id: OrderId::new("ord_1"),
            order_number: "M-1001".to_string(),
            status: OrderStatus::PendingPayment,
            payment_method: request.payment_method,
            external_payment_order_id: None,
            external_transaction_id: None,
            paid_amount: None,
            paid_at: None,
            items: request.items,
            summary: request.summary,
            created_at: Utc::now(),
        };
        *self.created.lock().expect("created lock") = Some(order.clone());
        Ok(order)
    }

    async fn order(&self, _id: &OrderId) -> Result<Order, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let status = {
            let mut script = self.status_script.lock().expect("script lock");
            if script.len() > 1 {
                script.remove(0)
            } else {
                *script.first().unwrap_or(&OrderStatus::PendingPayment)
            }
        };
        let mut order = self
            .created
            .lock()
            .expect("created lock")
            .clone()
            .unwrap_or_else(|| Order {
                id: OrderId::new("ord_1"),
                order_number: "M-1001".to_string(),
                status: OrderStatus::PendingPayment,
                payment_method: PaymentMethod::OnlineGateway,
                external_payment_order_id: None,
                external_transaction_id: None,
                paid_amount: None,
                paid_at: None,
                items: vec![],
                summary: OrderSummary::default(),
                created_at: Utc::now(),
            });
        order.status = status;
        Ok(order)
    }
}

struct FakeGateway;

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        _amount: Decimal,
        _currency: CurrencyCode,
        _description: &str,
    ) -> Result<GatewayOrder, ApiError> {
        Ok(GatewayOrder {
            external_order_id: ExternalOrderId::new("GW-1"),
            approval_url: "https://pay.example.com/approve/GW-1".to_string(),
        })
    }

    async fn capture_order(&self, _id: &ExternalOrderId) -> Result<GatewayCapture, ApiError> {
        unreachable!("capture happens server-side in these flows")
    }

    async fn order_details(
        &self,
        _id: &ExternalOrderId,
    ) -> Result<GatewayOrderDetails, ApiError> {
        unreachable!("not consulted by these flows")
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn product(id: &str, price: i64, stock: u32) -> Product {
    Product {
        id: ProductId::new(id),
        title: format!("Product {id}"),
        publish_status: PublishStatus::Published,
        price: Decimal::from(price),
        stock,
        variants: vec![],
    }
}

fn add(cart: &CartStore, id: &str, quantity: u32, price: i64, stock: u32) {
    cart.add_item(AddItemRequest {
        product_id: ProductId::new(id),
        variant: None,
        quantity,
        unit_price: Decimal::from(price),
        available_stock: stock,
    })
    .expect("add item");
}

fn reconciler(backend: FakeBackend, store: Arc<MemoryStore>) -> PaymentReconciler<FakeBackend> {
    PaymentReconciler::new(backend, store, Duration::from_secs(10), 30)
}

// ============================================================================
// Flows
// ============================================================================

#[tokio::test(start_paused = true)]
async fn happy_path_ends_with_cleared_cart_and_correlation() {
    let store = Arc::new(MemoryStore::new());
    let cart = CartStore::new(Arc::clone(&store) as Arc<dyn KeyValueStore>);
    add(&cart, "P1", 2, 10, 5);
    add(&cart, "P2", 1, 7, 3);

    // Validate against the live catalog; nothing drifted here.
    let validator = CartValidator::new(FakeCatalog {
        products: HashMap::from([
            (ProductId::new("P1"), product("P1", 10, 5)),
            (ProductId::new("P2"), product("P2", 7, 3)),
        ]),
    });
    let report = validator.validate_and_commit(&cart).await.expect("validate");
    assert!(report.is_valid);

    // Submit the validated cart.
    let backend = FakeBackend::new(vec![
        OrderStatus::PendingPayment,
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
    ]);
    let request = CreateOrderRequest::from_validated_cart(
        &cart.get().expect("get"),
        AddressRefs {
            shipping_address_id: AddressId::new("addr-1"),
            billing_address_id: None,
        },
        PaymentMethod::OnlineGateway,
        None,
    );
    let order = backend.create_order(request).await.expect("create");
    assert_eq!(order.summary.subtotal, Decimal::from(27));
    cart.set_pending_order(Some(order.id.clone())).expect("pending");

    // Hand off to the gateway; the correlation must exist before redirect.
    let bridge = PaymentGatewayBridge::new(FakeGateway, Arc::clone(&store) as _);
    let redirect = bridge
        .begin_payment(&order.id, order.summary.total, CurrencyCode::USD, "M-1001")
        .await
        .expect("begin payment");
    assert!(redirect.approval_url.starts_with("https://"));
    assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_some());

    // Return from the redirect: reconcile to a terminal outcome.
    let outcome = reconciler(backend.clone(), Arc::clone(&store))
        .reconcile(None)
        .await
        .expect("reconcile");
    let PaymentOutcome::Paid(paid) = outcome else {
        panic!("expected Paid, got {outcome:?}");
    };
    assert_eq!(paid.id, order.id);
    assert_eq!(backend.fetch_count(), 3);

    // Terminal outcome: clear the cart, correlation already gone.
    cart.clear().expect("clear");
    assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_none());
    assert!(cart.get().expect("get").is_empty());
}

#[tokio::test]
async fn order_creation_failure_leaves_cart_and_store_untouched() {
    let store = Arc::new(MemoryStore::new());
    let cart = CartStore::new(Arc::clone(&store) as Arc<dyn KeyValueStore>);
    add(&cart, "P1", 2, 10, 5);
    let before = cart.get().expect("get");

    let backend = FakeBackend::failing();
    let request = CreateOrderRequest::from_validated_cart(
        &before,
        AddressRefs {
            shipping_address_id: AddressId::new("addr-1"),
            billing_address_id: None,
        },
        PaymentMethod::OnlineGateway,
        None,
    );

    assert!(backend.create_order(request).await.is_err());

    // The failed attempt is fully repeatable: cart intact, no correlation.
    let after = cart.get().expect("get");
    assert_eq!(after.items.len(), before.items.len());
    assert_eq!(after.total, before.total);
    assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_none());
}

#[tokio::test(start_paused = true)]
async fn validation_reconciles_cart_before_submission() {
    let store = Arc::new(MemoryStore::new());
    let cart = CartStore::new(Arc::clone(&store) as Arc<dyn KeyValueStore>);
    // Stock was 5 when added; the catalog now says 1 and the price moved.
    add(&cart, "P1", 2, 10, 5);
    add(&cart, "P2", 1, 7, 3);

    let validator = CartValidator::new(FakeCatalog {
        products: HashMap::from([
            (ProductId::new("P1"), product("P1", 12, 1)),
            // P2 vanished from the catalog entirely.
        ]),
    });
    let report = validator.validate_and_commit(&cart).await.expect("validate");

    assert!(!report.is_valid);
    assert_eq!(report.issues.len(), 2);

    let reconciled = cart.get().expect("get");
    assert_eq!(reconciled.items.len(), 1);
    assert_eq!(reconciled.items[0].quantity, 1);
    assert_eq!(reconciled.items[0].unit_price, Decimal::from(12));
    assert_eq!(reconciled.subtotal, Decimal::from(12));

    // The submission snapshot reflects the reconciled cart, not the stale one.
    let request = CreateOrderRequest::from_validated_cart(
        &reconciled,
        AddressRefs {
            shipping_address_id: AddressId::new("addr-1"),
            billing_address_id: None,
        },
        PaymentMethod::OnlineGateway,
        None,
    );
    assert_eq!(request.items.len(), 1);
    assert_eq!(request.summary.subtotal, Decimal::from(12));
}

#[tokio::test(start_paused = true)]
async fn timeout_preserves_correlation_for_a_later_resume() {
    let store = Arc::new(MemoryStore::new());
    let bridge = PaymentGatewayBridge::new(FakeGateway, Arc::clone(&store) as _);
    bridge
        .begin_payment(
            &OrderId::new("ord_1"),
            Decimal::from(27),
            CurrencyCode::USD,
            "M-1001",
        )
        .await
        .expect("begin payment");

    // First return: the backend never reports a terminal status.
    let stuck = FakeBackend::new(vec![OrderStatus::PendingPayment]);
    let outcome = reconciler(stuck.clone(), Arc::clone(&store))
        .reconcile(None)
        .await
        .expect("reconcile");
    assert!(matches!(outcome, PaymentOutcome::TimedOut));
    assert_eq!(stuck.fetch_count(), 30);
    assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_some());

    // Later visit: the correlation survived, so reconciliation resumes
    // without an explicit order id and now resolves.
    let settled = FakeBackend::new(vec![OrderStatus::Paid]);
    let outcome = reconciler(settled, Arc::clone(&store))
        .reconcile(None)
        .await
        .expect("reconcile");
    assert!(matches!(outcome, PaymentOutcome::Paid(_)));
    assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_none());
}

#[tokio::test]
async fn reconcile_without_any_pending_payment_is_fatal() {
    let store = Arc::new(MemoryStore::new());
    let backend = FakeBackend::new(vec![]);
    let result = reconciler(backend, store).reconcile(None).await;
    assert!(matches!(result, Err(CheckoutError::NoPendingPayment)));
}

#[tokio::test(start_paused = true)]
async fn buyer_cancellation_at_the_provider_is_neutral() {
    let store = Arc::new(MemoryStore::new());
    let bridge = PaymentGatewayBridge::new(FakeGateway, Arc::clone(&store) as _);
    bridge
        .begin_payment(
            &OrderId::new("ord_1"),
            Decimal::from(27),
            CurrencyCode::USD,
            "M-1001",
        )
        .await
        .expect("begin payment");

    let backend = FakeBackend::new(vec![OrderStatus::Cancelled]);
    let outcome = reconciler(backend, Arc::clone(&store))
        .reconcile(None)
        .await
        .expect("reconcile");

    // Cancellation resolves the pending payment like any terminal outcome.
    assert!(matches!(outcome, PaymentOutcome::Cancelled(_)));
    assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_none());
}
