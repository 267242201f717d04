use std::collections::HashMap;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{OrderList, OrderView, PlaceOrder};
use crate::domain::ports::{ConfirmationNotifier, OrderRepository, ProductCatalog};
use crate::domain::product::ProductView;

pub const DEFAULT_STALE_AFTER_HOURS: i64 = 24;

pub struct OrderService<R, C, N> {
    orders: R,
    catalog: C,
    notifier: N,
    stale_after: Duration,
}

impl<R, C, N> OrderService<R, C, N>
where
    R: OrderRepository,
    C: ProductCatalog,
    N: ConfirmationNotifier,
{
    pub fn new(orders: R, catalog: C, notifier: N) -> Self {
        Self {
            orders,
            catalog,
            notifier,
            stale_after: Duration::hours(DEFAULT_STALE_AFTER_HOURS),
        }
    }

    /// Pending orders older than this are eligible for automatic cancellation.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Place an order for `user_id`, reserving stock for every line.
    ///
    /// Validation runs twice: once here against unlocked catalog reads so
    /// obviously-bad requests fail before any transaction is opened, and
    /// again inside the reservation transaction under per-product row locks.
    /// The second pass is the one that makes oversells impossible; this one
    /// just produces a fast, precise error in the common case.
    pub fn place_order(&self, user_id: Uuid, input: PlaceOrder) -> Result<OrderView, DomainError> {
        if input.shipping_address.trim().is_empty() {
            return Err(DomainError::Validation(
                "Shipping address is required.".to_string(),
            ));
        }
        if input.items.is_empty() {
            return Err(DomainError::Validation(
                "Order must have at least one item.".to_string(),
            ));
        }
        for line in &input.items {
            if line.quantity <= 0 {
                return Err(DomainError::Validation(format!(
                    "Quantity for product {} must be at least 1.",
                    line.product_id
                )));
            }
        }

        let ids: Vec<Uuid> = input.items.iter().map(|l| l.product_id).collect();
        let products = self.catalog.load(&ids)?;
        let by_id: HashMap<Uuid, &ProductView> = products.iter().map(|p| (p.id, p)).collect();

        for line in &input.items {
            let product = by_id
                .get(&line.product_id)
                .ok_or(DomainError::ProductNotFound(line.product_id))?;
            if !product.is_active {
                return Err(DomainError::ProductUnavailable {
                    name: product.name.clone(),
                });
            }
            if product.stock_quantity < line.quantity {
                return Err(DomainError::InsufficientStock {
                    name: product.name.clone(),
                    requested: line.quantity,
                    available: product.stock_quantity,
                });
            }
        }

        let order = self
            .orders
            .create(user_id, input.shipping_address, input.notes, input.items)?;

        // The order is durable at this point. Confirmation dispatch is
        // best-effort and must never fail the placement.
        if let Err(e) = self.notifier.notify_order_confirmed(order.id) {
            log::warn!(
                "confirmation dispatch failed for order {}: {}",
                order.order_number,
                e
            );
        }

        Ok(order)
    }

    pub fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, DomainError> {
        self.orders
            .find_for_user(user_id, order_id)?
            .ok_or(DomainError::OrderNotFound)
    }

    pub fn list_orders(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderList, DomainError> {
        self.orders.list_for_user(user_id, page, limit)
    }

    /// Cancel a pending order on behalf of its owner, restoring the
    /// reserved stock.
    pub fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, DomainError> {
        let order = self
            .orders
            .find_by_id(order_id)?
            .ok_or(DomainError::OrderNotFound)?;
        if order.user_id != user_id {
            return Err(DomainError::Forbidden);
        }
        self.orders.restore_and_cancel(order_id)
    }

    /// Cancel every pending order older than the staleness threshold.
    ///
    /// Each order is reaped in its own transaction; one failure is logged
    /// and skipped so it cannot halt the rest of the batch. Losing the
    /// pending-status race to a concurrent manual cancel is expected and
    /// not an error.
    pub fn reap_stale_orders(&self) -> Result<usize, DomainError> {
        let cutoff = Utc::now() - self.stale_after;
        let stale = self.orders.stale_pending_ids(cutoff)?;

        let mut cancelled = 0;
        for order_id in stale {
            match self.orders.restore_and_cancel(order_id) {
                Ok(order) => {
                    cancelled += 1;
                    log::info!("cancelled stale order {}", order.order_number);
                }
                Err(DomainError::InvalidState(_)) => {
                    log::debug!("order {} no longer pending, skipping", order_id);
                }
                Err(e) => {
                    log::error!("failed to reap order {}: {}", order_id, e);
                }
            }
        }

        log::info!("Cancelled {} stale orders", cancelled);
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bigdecimal::BigDecimal;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::domain::errors::NotifyError;
    use crate::domain::order::{OrderItemView, OrderStatus, ReservationLine};

    fn product(id: Uuid, name: &str, stock: i32, active: bool) -> ProductView {
        ProductView {
            id,
            name: name.to_string(),
            price: "49.99".parse().expect("valid decimal"),
            stock_quantity: stock,
            is_active: active,
        }
    }

    fn order_view(id: Uuid, user_id: Uuid, status: OrderStatus) -> OrderView {
        OrderView {
            id,
            order_number: Uuid::new_v4(),
            user_id,
            status,
            total_amount: BigDecimal::from(0),
            shipping_address: "123 Test St".to_string(),
            notes: String::new(),
            items: Vec::<OrderItemView>::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct StubRepo {
        existing: Vec<OrderView>,
        create_calls: Mutex<usize>,
        cancel_calls: Mutex<Vec<Uuid>>,
        cancel_error: Option<fn() -> DomainError>,
        stale: Vec<Uuid>,
    }

    impl OrderRepository for StubRepo {
        fn create(
            &self,
            user_id: Uuid,
            shipping_address: String,
            notes: String,
            _items: Vec<ReservationLine>,
        ) -> Result<OrderView, DomainError> {
            *self.create_calls.lock().unwrap() += 1;
            let mut order = order_view(Uuid::new_v4(), user_id, OrderStatus::Pending);
            order.shipping_address = shipping_address;
            order.notes = notes;
            Ok(order)
        }

        fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderView>, DomainError> {
            Ok(self.existing.iter().find(|o| o.id == order_id).cloned())
        }

        fn find_for_user(
            &self,
            user_id: Uuid,
            order_id: Uuid,
        ) -> Result<Option<OrderView>, DomainError> {
            Ok(self
                .existing
                .iter()
                .find(|o| o.id == order_id && o.user_id == user_id)
                .cloned())
        }

        fn list_for_user(
            &self,
            user_id: Uuid,
            _page: i64,
            _limit: i64,
        ) -> Result<OrderList, DomainError> {
            let items: Vec<OrderView> = self
                .existing
                .iter()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect();
            let total = items.len() as i64;
            Ok(OrderList { items, total })
        }

        fn restore_and_cancel(&self, order_id: Uuid) -> Result<OrderView, DomainError> {
            if let Some(make_err) = self.cancel_error {
                return Err(make_err());
            }
            self.cancel_calls.lock().unwrap().push(order_id);
            let mut order = self
                .existing
                .iter()
                .find(|o| o.id == order_id)
                .cloned()
                .unwrap_or_else(|| order_view(order_id, Uuid::new_v4(), OrderStatus::Pending));
            order.status = OrderStatus::Cancelled;
            Ok(order)
        }

        fn stale_pending_ids(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, DomainError> {
            Ok(self.stale.clone())
        }
    }

    struct StubCatalog {
        products: Vec<ProductView>,
    }

    impl ProductCatalog for StubCatalog {
        fn load(&self, ids: &[Uuid]) -> Result<Vec<ProductView>, DomainError> {
            Ok(self
                .products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct StubNotifier {
        calls: Mutex<usize>,
        fail: bool,
    }

    impl ConfirmationNotifier for StubNotifier {
        fn notify_order_confirmed(&self, _order_id: Uuid) -> Result<(), NotifyError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                Err(NotifyError("broker unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn place_one(product_id: Uuid, quantity: i32) -> PlaceOrder {
        PlaceOrder {
            shipping_address: "123 Test St, Cape Town".to_string(),
            notes: String::new(),
            items: vec![ReservationLine {
                product_id,
                quantity,
            }],
        }
    }

    fn service(
        repo: StubRepo,
        products: Vec<ProductView>,
        notifier: StubNotifier,
    ) -> OrderService<StubRepo, StubCatalog, StubNotifier> {
        OrderService::new(repo, StubCatalog { products }, notifier)
    }

    #[test]
    fn empty_order_is_rejected_before_any_store_access() {
        let svc = service(StubRepo::default(), vec![], StubNotifier::default());
        let input = PlaceOrder {
            shipping_address: "123 Test St".to_string(),
            notes: String::new(),
            items: vec![],
        };

        let err = svc.place_order(Uuid::new_v4(), input).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(*svc.orders.create_calls.lock().unwrap(), 0);
    }

    #[test]
    fn blank_shipping_address_is_rejected() {
        let pid = Uuid::new_v4();
        let svc = service(
            StubRepo::default(),
            vec![product(pid, "Speaker", 10, true)],
            StubNotifier::default(),
        );
        let mut input = place_one(pid, 1);
        input.shipping_address = "   ".to_string();

        let err = svc.place_order(Uuid::new_v4(), input).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let pid = Uuid::new_v4();
        let svc = service(
            StubRepo::default(),
            vec![product(pid, "Speaker", 10, true)],
            StubNotifier::default(),
        );

        let err = svc.place_order(Uuid::new_v4(), place_one(pid, 0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn unknown_product_fails_precheck() {
        let svc = service(StubRepo::default(), vec![], StubNotifier::default());
        let pid = Uuid::new_v4();

        let err = svc.place_order(Uuid::new_v4(), place_one(pid, 1)).unwrap_err();
        assert!(matches!(err, DomainError::ProductNotFound(id) if id == pid));
    }

    #[test]
    fn inactive_product_fails_precheck() {
        let pid = Uuid::new_v4();
        let svc = service(
            StubRepo::default(),
            vec![product(pid, "Speaker", 10, false)],
            StubNotifier::default(),
        );

        let err = svc.place_order(Uuid::new_v4(), place_one(pid, 1)).unwrap_err();
        assert!(matches!(err, DomainError::ProductUnavailable { .. }));
    }

    #[test]
    fn insufficient_stock_carries_available_quantity() {
        let pid = Uuid::new_v4();
        let svc = service(
            StubRepo::default(),
            vec![product(pid, "Speaker", 3, true)],
            StubNotifier::default(),
        );

        let err = svc.place_order(Uuid::new_v4(), place_one(pid, 5)).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn successful_placement_dispatches_confirmation() {
        let pid = Uuid::new_v4();
        let svc = service(
            StubRepo::default(),
            vec![product(pid, "Speaker", 10, true)],
            StubNotifier::default(),
        );

        svc.place_order(Uuid::new_v4(), place_one(pid, 2))
            .expect("placement should succeed");
        assert_eq!(*svc.notifier.calls.lock().unwrap(), 1);
    }

    #[test]
    fn notifier_failure_does_not_fail_the_order() {
        let pid = Uuid::new_v4();
        let svc = service(
            StubRepo::default(),
            vec![product(pid, "Speaker", 10, true)],
            StubNotifier {
                fail: true,
                ..StubNotifier::default()
            },
        );

        svc.place_order(Uuid::new_v4(), place_one(pid, 1))
            .expect("placement must survive a notifier failure");
    }

    #[test]
    fn cancel_by_non_owner_is_forbidden() {
        let owner = Uuid::new_v4();
        let order = order_view(Uuid::new_v4(), owner, OrderStatus::Pending);
        let order_id = order.id;
        let svc = service(
            StubRepo {
                existing: vec![order],
                ..StubRepo::default()
            },
            vec![],
            StubNotifier::default(),
        );

        let err = svc.cancel_order(Uuid::new_v4(), order_id).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
        assert!(svc.orders.cancel_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_unknown_order_is_not_found() {
        let svc = service(StubRepo::default(), vec![], StubNotifier::default());
        let err = svc.cancel_order(Uuid::new_v4(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DomainError::OrderNotFound));
    }

    #[test]
    fn get_order_hides_other_users_orders() {
        let owner = Uuid::new_v4();
        let order = order_view(Uuid::new_v4(), owner, OrderStatus::Pending);
        let order_id = order.id;
        let svc = service(
            StubRepo {
                existing: vec![order],
                ..StubRepo::default()
            },
            vec![],
            StubNotifier::default(),
        );

        assert!(svc.get_order(owner, order_id).is_ok());
        let err = svc.get_order(Uuid::new_v4(), order_id).unwrap_err();
        assert!(matches!(err, DomainError::OrderNotFound));
    }

    #[test]
    fn reaper_counts_cancelled_orders() {
        let stale: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let svc = service(
            StubRepo {
                stale: stale.clone(),
                ..StubRepo::default()
            },
            vec![],
            StubNotifier::default(),
        );

        let count = svc.reap_stale_orders().expect("reap should succeed");
        assert_eq!(count, 3);
        assert_eq!(*svc.orders.cancel_calls.lock().unwrap(), stale);
    }

    #[test]
    fn reaper_skips_orders_that_lost_the_pending_race() {
        let svc = service(
            StubRepo {
                stale: vec![Uuid::new_v4(), Uuid::new_v4()],
                cancel_error: Some(|| {
                    DomainError::InvalidState("Only pending orders can be cancelled.".to_string())
                }),
                ..StubRepo::default()
            },
            vec![],
            StubNotifier::default(),
        );

        let count = svc.reap_stale_orders().expect("batch must not halt");
        assert_eq!(count, 0);
    }
}
