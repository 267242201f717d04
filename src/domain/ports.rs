use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::{DomainError, NotifyError};
use super::order::{OrderList, OrderView, ReservationLine};
use super::product::ProductView;

pub trait OrderRepository: Send + Sync + 'static {
    /// Reserve stock and persist the order in a single transaction.
    /// All-or-nothing: if any line fails its in-lock stock re-check the
    /// whole order is rolled back.
    fn create(
        &self,
        user_id: Uuid,
        shipping_address: String,
        notes: String,
        items: Vec<ReservationLine>,
    ) -> Result<OrderView, DomainError>;

    fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderView>, DomainError>;

    fn find_for_user(&self, user_id: Uuid, order_id: Uuid)
        -> Result<Option<OrderView>, DomainError>;

    fn list_for_user(&self, user_id: Uuid, page: i64, limit: i64)
        -> Result<OrderList, DomainError>;

    /// Guarded `pending -> cancelled` transition that puts reserved stock
    /// back. Shared by manual cancellation and the stale-order reaper so
    /// the two paths cannot drift.
    fn restore_and_cancel(&self, order_id: Uuid) -> Result<OrderView, DomainError>;

    fn stale_pending_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, DomainError>;
}

pub trait ProductCatalog: Send + Sync + 'static {
    /// Unlocked catalog read for the fail-fast pre-check pass.
    fn load(&self, ids: &[Uuid]) -> Result<Vec<ProductView>, DomainError>;
}

/// Best-effort confirmation dispatch. Callers log the error and move on;
/// a failure here must never affect the durability of the order itself.
pub trait ConfirmationNotifier: Send + Sync + 'static {
    fn notify_order_confirmed(&self, order_id: Uuid) -> Result<(), NotifyError>;
}
