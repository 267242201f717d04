use bigdecimal::BigDecimal;
use uuid::Uuid;

/// Catalog read used by the pre-check pass. Stock and price here may be
/// stale by the time the reservation transaction runs; the transactional
/// pass re-reads both under a row lock.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub stock_quantity: i32,
    pub is_active: bool,
}
