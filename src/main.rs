use std::env;
use std::time::Duration;

use actix_web::web;
use commerce_service::{build_server, create_pool, order_service, reaper, run_migrations};
use dotenvy::dotenv;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env_or("PORT", 8080);
    let pool_size: u32 = env_or("DB_POOL_MAX_CONNECTIONS", 10);
    let reaper_interval_secs: u64 = env_or("REAPER_INTERVAL_SECS", 3600);
    let stale_order_hours: i64 = env_or("STALE_ORDER_HOURS", 24);

    let pool = create_pool(&database_url, pool_size);
    run_migrations(&pool);

    let service = web::Data::new(
        order_service(&pool).with_stale_after(chrono::Duration::hours(stale_order_hours)),
    );

    actix_web::rt::spawn(reaper::run(
        service.clone(),
        Duration::from_secs(reaper_interval_secs),
    ));

    log::info!("Starting server at http://{}:{}", host, port);

    build_server(service, &host, port)?.await
}
