//! Shared harness: a full router over in-process backends.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use switchyard_api::{create_api_router, ApiConfig, AppState, MemoryConnector};
use switchyard_events::InMemoryEventBus;
use switchyard_storage::{InMemoryCacheBackend, TopologyStore};
use tower::ServiceExt;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub connector: MemoryConnector,
    pub bus: Arc<InMemoryEventBus>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ApiConfig::in_memory())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let connector = MemoryConnector::new();
        let bus = Arc::new(InMemoryEventBus::default());
        let state = AppState::new(
            config,
            Arc::new(TopologyStore::in_memory()),
            Arc::new(connector.clone()),
            Arc::new(InMemoryCacheBackend::new()),
            bus.clone(),
        );
        let router = create_api_router(state.clone());
        Self {
            router,
            state,
            connector,
            bus,
        }
    }

    /// Send one request through the whole middleware stack.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), Box<dyn std::error::Error>> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Ok((status, json))
    }

    /// Push the primary `m` with secondaries `s1` and `s2`, then forget the
    /// sessions the push itself opened.
    pub async fn push_three_nodes(&self) -> TestResult {
        let (status, _) = self
            .send(
                Method::PUT,
                "/db",
                Some(serde_json::json!({
                    "master_db": "m:5432",
                    "slave_dbs": ["s1:5432", "s2:5432"],
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        self.connector.clear_served();
        Ok(())
    }

    /// Hosts sessions were opened on since the last reset.
    pub fn served_hosts(&self) -> Vec<String> {
        self.connector
            .served()
            .iter()
            .map(|endpoint| endpoint.host.clone())
            .collect()
    }
}

pub fn train_body(seats: i32) -> Value {
    serde_json::json!({
        "route": "Lisbon - Porto",
        "departure_time": "2025-03-01T08:00:00Z",
        "arrival_time": "2025-03-01T11:00:00Z",
        "available_seats": seats,
    })
}
