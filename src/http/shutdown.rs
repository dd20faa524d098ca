use std::sync::Arc;
use std::time::Duration;

use rocket::fairing::{self, Fairing, Info, Kind};
use rocket::{Orbit, Rocket};

use crate::queue::QueueIngestor;
use crate::reconcile::ReconcileWorker;
use crate::subscription::SubscriptionHub;

/// Overall budget for the shutdown sequence below (§5); if it elapses the
/// process exits anyway rather than hanging on a stuck component.
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

/// Coordinates the shutdown sequence described in the design notes: stop
/// taking new requests (handled by Rocket itself), then stop the queue
/// ingestor's flush loop, then wait for the reconcile worker's in-flight
/// cycle, then close every subscriber's outbound queue, in that order.
pub struct GracefulShutdown;

#[rocket::async_trait]
impl Fairing for GracefulShutdown {
    fn info(&self) -> Info {
        Info { name: "graceful shutdown coordinator", kind: Kind::Liftoff }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let shutdown = rocket.shutdown();
        let queue_ingestor = rocket.state::<Arc<QueueIngestor>>().cloned();
        let reconcile_worker = rocket.state::<Arc<ReconcileWorker>>().cloned();
        let hub = rocket.state::<Arc<SubscriptionHub>>().cloned();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining in-flight work");
            shutdown.notify();
            let drain = async {
                if let Some(queue_ingestor) = queue_ingestor {
                    queue_ingestor.stop().await;
                }
                if let Some(reconcile_worker) = reconcile_worker {
                    reconcile_worker.stop().await;
                }
                if let Some(hub) = hub {
                    hub.close_all();
                }
            };
            if tokio::time::timeout(SHUTDOWN_BUDGET, drain).await.is_err() {
                warn!("shutdown sequence exceeded {:?} budget, exiting anyway", SHUTDOWN_BUDGET);
            } else {
                info!("shutdown sequence complete");
            }
        });
    }
}
