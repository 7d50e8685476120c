use std::sync::Arc;
use std::time::Duration;

use tonic::server::NamedService;
use tonic_health::pb::health_server::HealthServer;
use tonic_health::server::HealthReporter;
use ward_core::Store;

/// A handle to the background ping task; dropping it (or calling
/// [`HealthCheckHandle::stop`]) stops the ticker.
pub struct HealthCheckHandle {
    cancel: tokio_util::sync::CancellationToken,
}

impl HealthCheckHandle {
    pub fn stop(self) {
        self.cancel.cancel();
    }
}

/// Starts a supervised task that pings `store` on a fixed interval and
/// drives the standard gRPC health channel's serving status for service
/// `S`. Returns the `tonic-health` service (register it on the `tonic`
/// server alongside the `Ward` service) and a handle that stops the
/// ticker.
pub fn run_health_check<S>(
    store: Arc<dyn Store>,
    interval: Duration,
) -> (HealthServer<impl tonic_health::pb::health_server::Health>, HealthCheckHandle)
where
    S: NamedService + 'static,
{
    let (reporter, health_service) = tonic_health::server::health_reporter();
    let cancel = tokio_util::sync::CancellationToken::new();
    let task_cancel = cancel.clone();

    tokio::spawn(run_ticker::<S>(store, reporter, interval, task_cancel));

    (health_service, HealthCheckHandle { cancel })
}

async fn run_ticker<S>(
    store: Arc<dyn Store>,
    mut reporter: HealthReporter,
    interval: Duration,
    cancel: tokio_util::sync::CancellationToken,
) where
    S: NamedService,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                reporter.set_not_serving::<S>().await;
                return;
            }
            _ = ticker.tick() => {
                match store.ping().await {
                    Ok(()) => reporter.set_serving::<S>().await,
                    Err(err) => {
                        tracing::warn!(%err, "store ping failed");
                        reporter.set_not_serving::<S>().await;
                    }
                }
            }
        }
    }
}
