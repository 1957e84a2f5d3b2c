//! Demo wiring: simulated route updates, an always-draining error consumer
//! and periodic snapshot reads.

use crate::error::DemoResult;
use crate::routes::{RouteOp, RouteTable};
use cowval_config::Config;
use cowval_reloader::{ErrorStream, Reloader, SubmitError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Number of distinct service prefixes the simulation cycles through.
const SERVICES: u64 = 8;

/// Timing of the simulated workload.
#[derive(Debug, Clone)]
pub struct DemoSettings {
    /// Delay between simulated route changes.
    pub update_every: Duration,
    /// Delay between snapshot reads logged by the demo.
    pub read_every: Duration,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            update_every: Duration::from_millis(250),
            read_every: Duration::from_secs(1),
        }
    }
}

/// What the demo observed before it stopped.
#[derive(Debug)]
pub struct DemoSummary {
    /// Snapshot published last.
    pub table: Arc<RouteTable>,
    /// Route changes submitted.
    pub submitted: u64,
    /// Cycle errors received.
    pub errors: u64,
}

/// The `n`-th simulated change. Every fifth change removes a route that was
/// never added, so the error path is exercised.
pub fn simulated_op(n: u64) -> RouteOp {
    if n % 5 == 4 {
        RouteOp::remove(format!("/retired/{n}"))
    } else {
        RouteOp::upsert(format!("/svc/{}", n % SERVICES), format!("backend-{n}"))
    }
}

/// Runs the demo until `shutdown` completes, then stops the reloader.
///
/// # Errors
///
/// Fails if the reloader cannot start or does not shut down cleanly.
pub async fn run_until<F>(
    config: Config,
    settings: DemoSettings,
    shutdown: F,
) -> DemoResult<DemoSummary>
where
    F: Future<Output = ()>,
{
    let reloader = Arc::new(Reloader::from_config(
        RouteTable::default(),
        &config.reloader,
    )?);
    let consumer = spawn_error_consumer(reloader.errors());
    let producer = spawn_producer(Arc::clone(&reloader), settings.update_every);

    let mut reads = interval(settings.read_every);
    reads.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = reads.tick() => {
                let table = reloader.reload();
                let report = reloader.last_report();
                info!(
                    "Snapshot revision {} with {} routes, /svc/0 -> {:?} (cycle {}, {:?})",
                    table.revision(),
                    table.len(),
                    table.resolve("/svc/0/health"),
                    report.cycle,
                    report.outcome
                );
            }
        }
    }

    info!("Stopping demo");
    reloader.shutdown().await?;
    let table = reloader.reload();

    // The producer stops on its first rejected submission and the error
    // stream ends once the reloader task has exited.
    let submitted = producer.await?;
    let errors = consumer.await?;

    Ok(DemoSummary {
        table,
        submitted,
        errors,
    })
}

fn spawn_producer(reloader: Arc<Reloader<RouteTable>>, every: Duration) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        let mut submitted = 0;
        loop {
            ticker.tick().await;
            match reloader.accept(simulated_op(submitted)) {
                Ok(()) => submitted += 1,
                Err(SubmitError::Stopped) => break,
                Err(e) => warn!("Dropping route change: {}", e),
            }
        }
        submitted
    })
}

fn spawn_error_consumer(mut errors: ErrorStream) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut received = 0;
        while let Some(error) = errors.recv().await {
            received += 1;
            debug!("Route update failed in cycle {}: {}", error.cycle(), error);
        }
        if errors.missed() > 0 {
            warn!("Error consumer missed {} errors", errors.missed());
        }
        received
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cowval_common::Operation;

    #[test]
    fn test_simulated_ops_mix_upserts_and_removals() {
        let removals: Vec<u64> = (0..10)
            .filter(|n| simulated_op(*n).kind() == "remove")
            .collect();
        assert_eq!(removals, vec![4, 9]);
    }

    #[test]
    fn test_simulated_upserts_cycle_through_services() {
        assert_eq!(simulated_op(0), RouteOp::upsert("/svc/0", "backend-0"));
        assert_eq!(simulated_op(9), RouteOp::remove("/retired/9"));
        assert_eq!(simulated_op(10), RouteOp::upsert("/svc/2", "backend-10"));
    }
}
