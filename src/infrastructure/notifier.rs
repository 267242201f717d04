use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::NotifyError;
use crate::domain::ports::ConfirmationNotifier;
use crate::schema::{order_items, orders};

use super::models::OrderRow;

/// Confirmation dispatch that writes the order summary to the log.
/// Stands in for a real mail or queue producer; the delivery guarantees
/// of whatever sits behind it are not this service's concern.
pub struct LogConfirmationNotifier {
    pool: DbPool,
}

impl LogConfirmationNotifier {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ConfirmationNotifier for LogConfirmationNotifier {
    fn notify_order_confirmed(&self, order_id: Uuid) -> Result<(), NotifyError> {
        let mut conn = self.pool.get().map_err(|e| NotifyError(e.to_string()))?;

        let order: OrderRow = orders::table
            .find(order_id)
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| NotifyError(e.to_string()))?
            .ok_or_else(|| NotifyError(format!("order {order_id} not found")))?;

        let item_count: i64 = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .count()
            .get_result(&mut conn)
            .map_err(|e| NotifyError(e.to_string()))?;

        log::info!(
            "ORDER CONFIRMED: #{} | user {} | {} items | ${}",
            order.order_number,
            order.user_id,
            item_count,
            order.total_amount
        );
        Ok(())
    }
}
