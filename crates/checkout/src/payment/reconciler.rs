//! Post-redirect payment reconciliation.
//!
//! On return from the provider (or on a fresh page load) the reconciler
//! resolves which local order is awaiting payment, then polls the canonical
//! order with bounded retries until a terminal payment status. Every poll
//! is a fresh fetch; order reads are never cached across attempts.

use std::sync::Arc;
use std::time::Duration;

use madrona_core::{OrderId, OrderStatus};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::CheckoutError;
use crate::orders::{Order, OrderApi};
use crate::storage::{KeyValueStore, keys};

/// Terminal result of payment reconciliation.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// Payment confirmed. The correlation has been cleared.
    Paid(Box<Order>),
    /// The provider reported a failed capture. The correlation has been
    /// cleared; the buyer should retry with another method.
    Failed(Box<Order>),
    /// The buyer aborted at the provider. Neutral, not an error; the
    /// correlation has been cleared.
    Cancelled(Box<Order>),
    /// No terminal status within the attempt ceiling. Inconclusive: the
    /// correlation is intentionally left in place so the buyer can resume.
    TimedOut,
}

impl PaymentOutcome {
    /// Whether this outcome resolved the pending payment (terminal).
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::TimedOut)
    }
}

/// Resolves the pending correlation and polls for a payment outcome.
#[derive(Clone)]
pub struct PaymentReconciler<S> {
    orders: S,
    store: Arc<dyn KeyValueStore>,
    interval: Duration,
    max_attempts: u32,
}

impl<S: OrderApi> PaymentReconciler<S> {
    /// Create a reconciler.
    ///
    /// `max_attempts` bounds the total number of order fetches (the first
    /// check counts as an attempt); `interval` is the wait between attempts.
    #[must_use]
    pub fn new(
        orders: S,
        store: Arc<dyn KeyValueStore>,
        interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            orders,
            store,
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Resolve which local order is awaiting payment.
    ///
    /// Priority: an explicit id (e.g. from the return-redirect query
    /// string), then the persisted correlation.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NoPendingPayment`] when neither source
    /// yields an order id; this is fatal and non-retryable.
    pub fn resolve_pending(
        &self,
        explicit: Option<OrderId>,
    ) -> Result<OrderId, CheckoutError> {
        if let Some(id) = explicit {
            return Ok(id);
        }
        keys::PENDING_PAYMENT
            .get(&*self.store)?
            .map(|correlation| correlation.local_order_id)
            .ok_or(CheckoutError::NoPendingPayment)
    }

    /// Poll the canonical order until a terminal payment status or the
    /// attempt ceiling.
    ///
    /// Performs at most `max_attempts` fetches and zero additional fetches
    /// after observing a terminal status. A fetch failure consumes the
    /// attempt but does not end the loop; a later attempt may succeed.
    /// On a terminal outcome the correlation is cleared exactly once; on
    /// timeout it is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error only if clearing the correlation fails; polling
    /// failures surface as [`PaymentOutcome::TimedOut`].
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn check_status(&self, order_id: &OrderId) -> Result<PaymentOutcome, CheckoutError> {
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.interval).await;
            }

            match self.orders.order(order_id).await {
                Ok(order) => {
                    if order.status.is_payment_terminal() {
                        self.clear_correlation()?;
                        info!(status = %order.status, attempt, "payment reached terminal status");
                        return Ok(match order.status {
                            OrderStatus::Paid => PaymentOutcome::Paid(Box::new(order)),
                            OrderStatus::Cancelled => PaymentOutcome::Cancelled(Box::new(order)),
                            _ => PaymentOutcome::Failed(Box::new(order)),
                        });
                    }
                    debug!(status = %order.status, attempt, "payment not yet terminal");
                }
                Err(e) => {
                    warn!(error = %e, attempt, "order fetch failed during payment polling");
                }
            }
        }

        info!(
            attempts = self.max_attempts,
            "payment polling ceiling reached without a terminal status"
        );
        Ok(PaymentOutcome::TimedOut)
    }

    /// Resolve the pending order and poll it. Convenience for the common
    /// return-from-redirect entry point.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NoPendingPayment`] if nothing is pending,
    /// or a storage error from clearing the correlation.
    pub async fn reconcile(
        &self,
        explicit: Option<OrderId>,
    ) -> Result<PaymentOutcome, CheckoutError> {
        let order_id = self.resolve_pending(explicit)?;
        self.check_status(&order_id).await
    }

    fn clear_correlation(&self) -> Result<(), CheckoutError> {
        keys::PENDING_PAYMENT.delete(&*self.store)?;
        Ok(())
    }
}

impl<S: OrderApi + Clone + 'static> PaymentReconciler<S> {
    /// Start polling as a spawned task.
    ///
    /// Returns a handle exposing cancellation and the eventual outcome, so
    /// component teardown can stop the loop instead of leaving it implicit.
    #[must_use]
    pub fn start(&self, order_id: OrderId) -> PollHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let reconciler = self.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                outcome = reconciler.check_status(&order_id) => outcome,
                _ = cancel_rx => Err(CheckoutError::PollCancelled),
            }
        });

        PollHandle {
            cancel: Some(cancel_tx),
            task,
        }
    }
}

/// Handle to a running poll task.
pub struct PollHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<PaymentOutcome, CheckoutError>>,
}

impl PollHandle {
    /// Request cancellation. The correlation is left untouched, like a
    /// timeout. Calling this more than once is a no-op.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Await the poll outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PollCancelled`] if the task was cancelled
    /// (or panicked), otherwise the poll result.
    pub async fn outcome(self) -> Result<PaymentOutcome, CheckoutError> {
        match self.task.await {
            Ok(result) => result,
            Err(_) => Err(CheckoutError::PollCancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use madrona_core::ExternalOrderId;

    use crate::http::ApiError;
    use crate::orders::{CreateOrderRequest, OrderSummary, PaymentMethod};
    use crate::payment::PendingPaymentCorrelation;
    use crate::storage::MemoryStore;

    use super::*;

    fn order_with_status(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new("ord_1"),
            order_number: "M-1001".to_string(),
            status,
            payment_method: PaymentMethod::OnlineGateway,
            external_payment_order_id: Some(ExternalOrderId::new("GW-1")),
            external_transaction_id: None,
            paid_amount: None,
            paid_at: None,
            items: vec![],
            summary: OrderSummary::default(),
            created_at: Utc::now(),
        }
    }

    /// Replays a scripted sequence of fetch results; `None` entries are
    /// network errors. The script's last entry repeats once exhausted.
    #[derive(Clone)]
    struct ScriptedOrders {
        script: Arc<Mutex<Vec<Option<OrderStatus>>>>,
        fetches: Arc<AtomicU32>,
    }

    impl ScriptedOrders {
        fn new(script: Vec<Option<OrderStatus>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script)),
                fetches: Arc::new(AtomicU32::new(0)),
            }
        }

        fn fetch_count(&self) -> u32 {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderApi for ScriptedOrders {
        async fn create_order(&self, _request: CreateOrderRequest) -> Result<Order, ApiError> {
            unreachable!("not used by the reconciler")
        }

        async fn order(&self, _id: &OrderId) -> Result<Order, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().expect("script lock");
            let entry = if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().cloned().flatten()
            };
            match entry {
                Some(status) => Ok(order_with_status(status)),
                None => Err(ApiError::Status {
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    body: "flaky".to_string(),
                }),
            }
        }
    }

    fn store_with_correlation() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        keys::PENDING_PAYMENT
            .set(
                &*store,
                &PendingPaymentCorrelation {
                    local_order_id: OrderId::new("ord_1"),
                    external_order_id: ExternalOrderId::new("GW-1"),
                },
            )
            .expect("seed correlation");
        store
    }

    fn reconciler(orders: ScriptedOrders, store: Arc<MemoryStore>) -> PaymentReconciler<ScriptedOrders> {
        PaymentReconciler::new(orders, store, Duration::from_secs(10), 30)
    }

    #[tokio::test(start_paused = true)]
    async fn test_paid_on_fourth_fetch() {
        let orders = ScriptedOrders::new(vec![
            Some(OrderStatus::PendingPayment),
            Some(OrderStatus::PendingPayment),
            Some(OrderStatus::PendingPayment),
            Some(OrderStatus::Paid),
        ]);
        let store = store_with_correlation();
        let reconciler = reconciler(orders.clone(), Arc::clone(&store));

        let outcome = reconciler
            .check_status(&OrderId::new("ord_1"))
            .await
            .expect("check");

        assert!(matches!(outcome, PaymentOutcome::Paid(_)));
        assert_eq!(orders.fetch_count(), 4);
        assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_ceiling_keeps_correlation() {
        let orders = ScriptedOrders::new(vec![Some(OrderStatus::PendingPayment)]);
        let store = store_with_correlation();
        let reconciler = PaymentReconciler::new(
            orders.clone(),
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Duration::from_secs(10),
            5,
        );

        let outcome = reconciler
            .check_status(&OrderId::new("ord_1"))
            .await
            .expect("check");

        assert!(matches!(outcome, PaymentOutcome::TimedOut));
        assert!(!outcome.is_resolved());
        assert_eq!(orders.fetch_count(), 5);
        // Timeout is inconclusive: the correlation must survive.
        assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_do_not_end_the_loop() {
        let orders = ScriptedOrders::new(vec![
            None,
            None,
            Some(OrderStatus::Paid),
        ]);
        let store = store_with_correlation();
        let reconciler = reconciler(orders.clone(), Arc::clone(&store));

        let outcome = reconciler
            .check_status(&OrderId::new("ord_1"))
            .await
            .expect("check");

        assert!(matches!(outcome, PaymentOutcome::Paid(_)));
        assert_eq!(orders.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_and_cancelled_are_distinct_outcomes() {
        for (status, expect_cancelled) in
            [(OrderStatus::Failed, false), (OrderStatus::Cancelled, true)]
        {
            let orders = ScriptedOrders::new(vec![Some(status)]);
            let store = store_with_correlation();
            let reconciler = reconciler(orders.clone(), Arc::clone(&store));

            let outcome = reconciler
                .check_status(&OrderId::new("ord_1"))
                .await
                .expect("check");

            match outcome {
                PaymentOutcome::Cancelled(_) => assert!(expect_cancelled),
                PaymentOutcome::Failed(_) => assert!(!expect_cancelled),
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert_eq!(orders.fetch_count(), 1);
            assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_none());
        }
    }

    #[tokio::test]
    async fn test_resolve_pending_priority() {
        let orders = ScriptedOrders::new(vec![Some(OrderStatus::PendingPayment)]);
        let store = store_with_correlation();
        let reconciler = reconciler(orders, Arc::clone(&store));

        // Explicit id wins over the correlation.
        let resolved = reconciler
            .resolve_pending(Some(OrderId::new("explicit")))
            .expect("resolve");
        assert_eq!(resolved, OrderId::new("explicit"));

        // Falls back to the persisted correlation.
        let resolved = reconciler.resolve_pending(None).expect("resolve");
        assert_eq!(resolved, OrderId::new("ord_1"));

        // Nothing pending anywhere is fatal.
        keys::PENDING_PAYMENT.delete(&*store).expect("delete");
        assert!(matches!(
            reconciler.resolve_pending(None),
            Err(CheckoutError::NoPendingPayment)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_resolves_handle_and_keeps_correlation() {
        let orders = ScriptedOrders::new(vec![Some(OrderStatus::PendingPayment)]);
        let store = store_with_correlation();
        let reconciler = reconciler(orders, Arc::clone(&store));

        let mut handle = reconciler.start(OrderId::new("ord_1"));
        tokio::task::yield_now().await;
        handle.cancel();

        assert!(matches!(
            handle.outcome().await,
            Err(CheckoutError::PollCancelled)
        ));
        assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_task_reports_outcome() {
        let orders = ScriptedOrders::new(vec![
            Some(OrderStatus::PendingPayment),
            Some(OrderStatus::Paid),
        ]);
        let store = store_with_correlation();
        let reconciler = reconciler(orders, Arc::clone(&store));

        let handle = reconciler.start(OrderId::new("ord_1"));
        let outcome = handle.outcome().await.expect("outcome");
        assert!(matches!(outcome, PaymentOutcome::Paid(_)));
        assert!(keys::PENDING_PAYMENT.get(&*store).expect("get").is_none());
    }
}
