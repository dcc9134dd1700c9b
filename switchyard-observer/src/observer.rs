//! The observation loop.
//!
//! Each cycle asks the cluster manager for the current roles, reads the
//! service registry, and pushes the full topology to every registered
//! replica. Nothing is remembered between cycles: a replica that missed a
//! push gets the same state again on the next one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use switchyard_core::{ClusterTopology, ConnectionTemplate};
use switchyard_storage::ServiceRegistry;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::autoctl::ClusterManager;
use crate::pusher::TopologyPusher;

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct ObserverMetrics {
    /// Cycles completed
    pub cycles: AtomicU64,
    /// Successful pushes, counted per replica
    pub pushes_ok: AtomicU64,
    /// Failed pushes, counted per replica
    pub pushes_failed: AtomicU64,
    /// Cycles where no single primary could be determined
    pub unknown_cycles: AtomicU64,
    /// Cycles where the registry could not be read
    pub registry_errors: AtomicU64,
}

impl ObserverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ObserverSnapshot {
        ObserverSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            pushes_ok: self.pushes_ok.load(Ordering::Relaxed),
            pushes_failed: self.pushes_failed.load(Ordering::Relaxed),
            unknown_cycles: self.unknown_cycles.load(Ordering::Relaxed),
            registry_errors: self.registry_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObserverSnapshot {
    pub cycles: u64,
    pub pushes_ok: u64,
    pub pushes_failed: u64,
    pub unknown_cycles: u64,
    pub registry_errors: u64,
}

/// What one cycle saw and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub topology: ClusterTopology,
    pub targets: usize,
    pub pushed: usize,
    pub failed: usize,
}

// ============================================================================
// OBSERVER
// ============================================================================

pub struct Observer {
    manager: Arc<dyn ClusterManager>,
    registry: Arc<dyn ServiceRegistry>,
    pusher: Arc<dyn TopologyPusher>,
    template: ConnectionTemplate,
    metrics: Arc<ObserverMetrics>,
}

impl Observer {
    pub fn new(
        manager: Arc<dyn ClusterManager>,
        registry: Arc<dyn ServiceRegistry>,
        pusher: Arc<dyn TopologyPusher>,
        template: ConnectionTemplate,
    ) -> Self {
        Self {
            manager,
            registry,
            pusher,
            template,
            metrics: Arc::new(ObserverMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<ObserverMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Current roles, or `unknown` when the manager fails or its answer is
    /// unusable.
    pub async fn observe(&self) -> ClusterTopology {
        match self.manager.topology().await {
            Ok(topology) => topology,
            Err(e) => {
                tracing::warn!(error = %e, "Cluster topology unavailable");
                ClusterTopology::unknown()
            }
        }
    }

    /// Run one observe-and-push cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        self.metrics.cycles.fetch_add(1, Ordering::Relaxed);
        let topology = self.observe().await;

        let Some(push) = topology.to_push(&self.template) else {
            self.metrics.unknown_cycles.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("No primary known, skipping push this cycle");
            return CycleReport {
                topology,
                targets: 0,
                pushed: 0,
                failed: 0,
            };
        };

        let members = match self.registry.members().await {
            Ok(members) => members,
            Err(e) => {
                self.metrics.registry_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Service registry unavailable, skipping push");
                return CycleReport {
                    topology,
                    targets: 0,
                    pushed: 0,
                    failed: 0,
                };
            }
        };

        let results = join_all(members.iter().map(|address| {
            let push = &push;
            async move { (address, self.pusher.push(address, push).await) }
        }))
        .await;

        let mut pushed = 0;
        let mut failed = 0;
        for (address, result) in results {
            match result {
                Ok(()) => {
                    pushed += 1;
                    tracing::debug!(address = %address, "Topology pushed");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(address = %address, error = %e, "Topology push failed");
                }
            }
        }
        self.metrics.pushes_ok.fetch_add(pushed as u64, Ordering::Relaxed);
        self.metrics.pushes_failed.fetch_add(failed as u64, Ordering::Relaxed);

        tracing::info!(
            master_db = %push.master_db,
            secondaries = push.slave_dbs.len(),
            targets = members.len(),
            pushed,
            failed,
            "Observer cycle completed"
        );

        CycleReport {
            topology,
            targets: members.len(),
            pushed,
            failed,
        }
    }

    /// Run cycles every `period` until `shutdown_rx` turns true.
    pub async fn run(
        self,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Arc<ObserverMetrics> {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(poll_interval_secs = period.as_secs(), "Topology observer started");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Topology observer shutting down");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            cycles = snapshot.cycles,
            pushes_ok = snapshot.pushes_ok,
            pushes_failed = snapshot.pushes_failed,
            unknown_cycles = snapshot.unknown_cycles,
            "Topology observer stopped"
        );

        self.metrics
    }
}
