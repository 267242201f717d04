use std::time::Duration;

use actix_web::web;

use crate::AppOrderService;

/// Periodic driver for stale-order cancellation.
///
/// Each tick runs one reap pass on the blocking pool. Pass-level failures
/// are logged and the loop keeps going; per-order failures are already
/// handled inside the pass itself.
pub async fn run(service: web::Data<AppOrderService>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // interval fires immediately; the first reap should wait a full period.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let service = service.clone();
        match web::block(move || service.reap_stale_orders()).await {
            Ok(Ok(count)) => {
                log::debug!("reaper pass complete, {count} orders cancelled");
            }
            Ok(Err(e)) => log::error!("reaper pass failed: {e}"),
            Err(e) => log::error!("reaper task could not run: {e}"),
        }
    }
}
