//! Delivery of topology pushes to replicas.

use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::TopologyPush;

use crate::error::{ObserverError, ObserverResult, PushError};

#[async_trait]
pub trait TopologyPusher: Send + Sync {
    /// Deliver `push` to the replica registered as `address` (`host:port`).
    async fn push(&self, address: &str, push: &TopologyPush) -> Result<(), PushError>;
}

/// `PUT http://{address}/db` with the push as JSON.
#[derive(Debug, Clone)]
pub struct HttpTopologyPusher {
    client: reqwest::Client,
}

impl HttpTopologyPusher {
    pub fn new(timeout: Duration) -> ObserverResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ObserverError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn url_for(address: &str) -> String {
        format!("http://{}/db", address)
    }
}

#[async_trait]
impl TopologyPusher for HttpTopologyPusher {
    async fn push(&self, address: &str, push: &TopologyPush) -> Result<(), PushError> {
        let response = self
            .client
            .put(Self::url_for(address))
            .json(push)
            .send()
            .await
            .map_err(|e| PushError::Transport {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Rejected {
                address: address.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
