#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

mod coldstore;
mod config;
mod domain;
mod engine;
mod hotindex;
mod http;
mod queue;
mod reconcile;
mod subscription;
mod util;

use std::net::SocketAddr;
use std::sync::Arc;

use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};

use crate::coldstore::postgres_store::PostgresColdStore;
use crate::coldstore::schema::run_startup_migrations;
use crate::coldstore::ColdStore;
use crate::config::ServiceConfig;
use crate::engine::RankingEngine;
use crate::hotindex::redis_store::RedisAdapter;
use crate::hotindex::HotIndex;
use crate::queue::QueueIngestor;
use crate::reconcile::ReconcileWorker;
use crate::subscription::SubscriptionHub;

const CONFIG_PATH: &str = "config.yml";

fn init_logging() {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()
        .expect("failed to initialize logger");
}

#[launch]
async fn rocket() -> Rocket<Build> {
    init_logging();

    let config = ServiceConfig::load_or_default(CONFIG_PATH);

    let hot_index: Arc<dyn HotIndex> = Arc::new(
        RedisAdapter::new(&config.hotindex).expect("failed to initialize hot index"),
    );
    let postgres = Arc::new(
        PostgresColdStore::new(&config.coldstore).expect("failed to initialize cold store"),
    );
    run_startup_migrations(postgres.pool()).await.expect("schema migration failed");
    let cold_store: Arc<dyn ColdStore> = postgres;

    let hub = Arc::new(SubscriptionHub::new());

    // The startup rebuild runs to completion before the API or queue
    // ingestor opens, so reads never observe a cold but empty hot index.
    let reconcile_worker = ReconcileWorker::new(hot_index.clone(), cold_store.clone(), config.sync.clone());
    if let Err(e) = reconcile_worker.sync_all_from_cold().await {
        warn!("startup hot-index rebuild failed: {}", e);
    }
    reconcile_worker.start().await;

    let engine = Arc::new(RankingEngine::new(hot_index.clone(), cold_store.clone(), hub.clone(), config.leaderboard.clone()));

    let queue_ingestor = QueueIngestor::new(engine.clone(), config.queue.clone());
    if let Err(e) = queue_ingestor.start().await {
        warn!("queue ingestor failed to start: {}", e);
    }

    {
        let hub = hub.clone();
        let ws_port = config.server.port + 1;
        let server_config = config.server.clone();
        tokio::spawn(async move {
            let addr: SocketAddr = format!("0.0.0.0:{}", ws_port).parse().expect("invalid websocket bind address");
            if let Err(e) = subscription::ws::run(hub, addr, server_config).await {
                warn!("subscription websocket listener stopped: {}", e);
            }
        });
    }

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .to_cors()
        .expect("failed to build CORS fairing");

    // Rocket's own defaults (port 8000) would otherwise shadow the configured
    // server port; keep_alive is the closest Rocket surface to idle_timeout.
    let rocket_config = rocket::Config {
        port: config.server.port,
        keep_alive: config.server.idle_timeout as u32,
        ..rocket::Config::default()
    };

    let rocket_build = rocket::custom(rocket_config)
        .manage(engine)
        .manage(hub)
        .manage(queue_ingestor)
        .manage(reconcile_worker)
        .attach(cors)
        .attach(http::shutdown::GracefulShutdown);

    http::mount_all(rocket_build)
}
