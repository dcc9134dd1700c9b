//! Axum Middleware for HTTP Request Tracing, Metrics and Deadlines
//!
//! Every request runs inside an `http_request` span, is counted and timed in
//! Prometheus, and is cut off with a 408 once the configured deadline passes.

use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{info_span, Instrument};

use super::metrics::METRICS;
use crate::error::ApiError;

/// Normalize path for metrics/spans (replace numeric ids with a placeholder).
///
/// This prevents high-cardinality label explosion in Prometheus. The realtime
/// route carries an arbitrary resource id and is collapsed the same way.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').collect();
    let is_ws = segments.get(1) == Some(&"ws");
    for (index, segment) in segments.iter_mut().enumerate() {
        let is_id = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
        if is_id || (is_ws && index == 2 && !segment.is_empty()) {
            *segment = "{id}";
        }
    }
    segments.join("/")
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        );
    }

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

/// Answer 408 when the inner handler does not finish within `deadline`.
///
/// The abandoned handler future is dropped, which releases any scoped
/// database session it held.
pub async fn timeout_middleware(
    State(deadline): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                path = %path,
                deadline_ms = deadline.as_millis() as u64,
                "Request timed out"
            );
            ApiError::request_timeout().into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_normalize_path_numeric_id() {
        assert_eq!(normalize_path("/trains/12345"), "/trains/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/trains"), "/trains");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }

    #[test]
    fn test_normalize_path_ws_resource() {
        assert_eq!(normalize_path("/ws/route-42"), "/ws/{id}");
        assert_eq!(normalize_path("/ws/42"), "/ws/{id}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_gets_408() -> Result<(), Box<dyn std::error::Error>> {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "late"
                }),
            )
            .route("/fast", get(|| async { "ok" }))
            .layer(from_fn_with_state(Duration::from_secs(5), timeout_middleware));

        let response = app
            .clone()
            .oneshot(axum::http::Request::builder().uri("/slow").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let response = app
            .oneshot(axum::http::Request::builder().uri("/fast").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
