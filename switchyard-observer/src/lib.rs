//! Switchyard Observer - Cluster Topology Propagation
//!
//! Polls the pg_auto_failover monitor for the current primary and
//! secondaries and pushes the result to every service replica listed in the
//! service registry.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(observer.run(config.poll_interval, shutdown_rx));
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

pub mod autoctl;
pub mod config;
pub mod error;
pub mod observer;
pub mod pusher;

pub use autoctl::{parse_autoctl_state, ClusterManager, PgAutoctlManager};
pub use config::ObserverConfig;
pub use error::{ObserverError, ObserverResult, ParseError, PushError};
pub use observer::{CycleReport, Observer, ObserverMetrics, ObserverSnapshot};
pub use pusher::{HttpTopologyPusher, TopologyPusher};
