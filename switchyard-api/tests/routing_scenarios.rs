//! End-to-end routing scenarios through the full router.
//!
//! Every test drives HTTP requests into `create_api_router` over in-process
//! tables and checks which cluster node each session was opened on.

use axum::http::{Method, StatusCode};
use serde_json::json;

#[path = "support/app.rs"]
#[allow(dead_code)]
mod app;

use app::{train_body, TestApp, TestResult};

#[tokio::test]
async fn test_requests_fail_closed_before_first_push() -> TestResult {
    let app = TestApp::new();

    let (status, body) = app.send(Method::POST, "/trains", Some(train_body(10))).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "TOPOLOGY_UNKNOWN");

    let (status, _) = app.send(Method::GET, "/trains", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app.send(Method::GET, "/db", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    assert!(app.served_hosts().is_empty(), "no session may be opened without a topology");
    Ok(())
}

#[tokio::test]
async fn test_push_then_writes_on_primary_and_reads_on_secondaries() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;

    let (status, train) = app.send(Method::POST, "/trains", Some(train_body(10))).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.served_hosts(), vec!["m".to_string()]);

    app.connector.clear_served();
    let id = train["id"].as_i64().ok_or("train id missing")?;
    for _ in 0..10 {
        let (status, _) = app.send(Method::GET, &format!("/trains/{}", id), None).await?;
        assert_eq!(status, StatusCode::OK);
    }
    let served = app.served_hosts();
    assert_eq!(served.len(), 10);
    assert!(
        served.iter().all(|host| host == "s1" || host == "s2"),
        "reads reached a non-secondary: {:?}",
        served
    );
    Ok(())
}

#[tokio::test]
async fn test_reads_use_primary_without_secondaries() -> TestResult {
    let app = TestApp::new();
    let (status, _) = app
        .send(Method::PUT, "/db", Some(json!({"master_db": "solo:5432", "slave_dbs": []})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    app.connector.clear_served();

    let (status, _) = app.send(Method::GET, "/lobbies", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.served_hosts(), vec!["solo".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_writes_follow_new_primary_after_failover_push() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;

    let (status, body) = app
        .send(
            Method::PUT,
            "/db",
            Some(json!({"master_db": "s1:5432", "slave_dbs": ["s2:5432"]})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);
    app.connector.clear_served();

    let (status, _) = app.send(Method::POST, "/trains", Some(train_body(5))).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.served_hosts(), vec!["s1".to_string()]);

    let (status, view) = app.send(Method::GET, "/db", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["master_db"], "s1:5432");
    assert_eq!(view["slave_dbs"], json!(["s2:5432"]));
    Ok(())
}

#[tokio::test]
async fn test_invalid_push_keeps_previous_topology() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;

    let (status, body) = app
        .send(Method::PUT, "/db", Some(json!({"master_db": "", "slave_dbs": []})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["code"].is_string());

    let (_, view) = app.send(Method::GET, "/db", None).await?;
    assert_eq!(view["master_db"], "m:5432");
    assert_eq!(view["version"], 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn test_concurrent_pushes_get_distinct_versions() -> TestResult {
    let app = TestApp::new();

    let pushes = (0..8).map(|i| {
        let body = json!({"master_db": format!("m{i}:5432"), "slave_dbs": ["s1:5432"]});
        app.send(Method::PUT, "/db", Some(body))
    });
    let mut versions = Vec::new();
    for result in futures_util::future::join_all(pushes).await {
        let (status, body) = result?;
        assert_eq!(status, StatusCode::OK);
        versions.push(body["version"].as_u64().ok_or("version missing")?);
    }
    versions.sort_unstable();
    assert_eq!(versions, (1..=8).collect::<Vec<u64>>());

    let (status, view) = app.send(Method::GET, "/db", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["version"], 8);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_primary_answers_503_and_releases_nothing() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;
    app.connector
        .set_unreachable(&switchyard_core::Endpoint::new("m", 5432), true);

    let (status, body) = app.send(Method::POST, "/trains", Some(train_body(5))).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(app.connector.open_sessions(), 0);
    Ok(())
}

#[tokio::test]
async fn test_collection_cache_is_invalidated_by_writes() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;

    let (_, train) = app.send(Method::POST, "/trains", Some(train_body(10))).await?;
    let id = train["id"].as_i64().ok_or("train id missing")?;
    app.connector.clear_served();

    // First list loads from a replica, the second is a cache hit.
    let (status, list) = app.send(Method::GET, "/trains", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["route"], "Lisbon - Porto");
    let (_, _) = app.send(Method::GET, "/trains", None).await?;
    assert_eq!(app.served_hosts().len(), 1);

    let (status, updated) = app
        .send(
            Method::PUT,
            &format!("/trains/{}", id),
            Some(json!({"route": "Porto - Faro"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["route"], "Porto - Faro");
    app.connector.clear_served();

    let (_, list) = app.send(Method::GET, "/trains", None).await?;
    assert_eq!(list[0]["route"], "Porto - Faro");
    let served = app.served_hosts();
    assert_eq!(served.len(), 1, "list after a write must reload");
    assert!(served[0] == "s1" || served[0] == "s2");
    Ok(())
}

#[tokio::test]
async fn test_seats_never_go_below_zero() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;

    let (_, train) = app.send(Method::POST, "/trains", Some(train_body(1))).await?;
    let id = train["id"].as_i64().ok_or("train id missing")?;

    let (status, booking) = app
        .send(
            Method::POST,
            "/bookings",
            Some(json!({"train_id": id, "user_credentials": "ana@example.com"})),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(
            Method::POST,
            "/bookings",
            Some(json!({"train_id": id, "user_credentials": "rui@example.com"})),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "STATE_CONFLICT");

    let (_, train) = app.send(Method::GET, &format!("/trains/{}", id), None).await?;
    assert_eq!(train["available_seats"], 0);

    let booking_id = booking["id"].as_i64().ok_or("booking id missing")?;
    let (status, _) = app
        .send(Method::DELETE, &format!("/bookings/{}", booking_id), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, train) = app.send(Method::GET, &format!("/trains/{}", id), None).await?;
    assert_eq!(train["available_seats"], 1);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_booking_is_a_conflict() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;
    let (_, train) = app.send(Method::POST, "/trains", Some(train_body(5))).await?;
    let booking = json!({"train_id": train["id"], "user_credentials": "ana@example.com"});

    let (status, _) = app.send(Method::POST, "/bookings", Some(booking.clone())).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.send(Method::POST, "/bookings", Some(booking)).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn test_entity_errors_map_to_status_codes() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;

    let (status, body) = app.send(Method::GET, "/trains/999", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TRAIN_NOT_FOUND");

    let (status, body) = app.send(Method::DELETE, "/bookings/999", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "BOOKING_NOT_FOUND");

    let (status, _) = app.send(Method::POST, "/trains", Some(train_body(401))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, train) = app.send(Method::POST, "/trains", Some(train_body(3))).await?;
    let (status, _) = app
        .send(Method::PUT, &format!("/trains/{}", train["id"]), Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_lobby_lifecycle() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;
    let (_, train) = app.send(Method::POST, "/trains", Some(train_body(3))).await?;

    let (status, lobby) = app
        .send(Method::POST, "/lobbies", Some(json!({"train_id": train["id"]})))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(lobby["status"], "active");

    let (status, _) = app
        .send(Method::POST, "/lobbies", Some(json!({"train_id": train["id"]})))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(Method::DELETE, &format!("/lobbies/{}", lobby["id"]), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, list) = app.send(Method::GET, "/lobbies", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));
    Ok(())
}

#[tokio::test]
async fn test_health_and_status_endpoints() -> TestResult {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/status", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["message"], "Train booking service is running");

    let (status, _) = app.send(Method::GET, "/health/live", None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::GET, "/health/ready", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");

    app.push_three_nodes().await?;
    let (status, body) = app.send(Method::GET, "/health/ready", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["topology"]["secondaries"], 2);
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_switchyard_series() -> TestResult {
    let app = TestApp::new();
    app.push_three_nodes().await?;
    let _ = app.send(Method::GET, "/trains", None).await?;

    let (status, body) = app.send(Method::GET, "/metrics", None).await?;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().ok_or("metrics body is not text")?;
    assert!(text.contains("switchyard_http_requests_total"));
    assert!(text.contains("switchyard_topology_pushes_total"));
    Ok(())
}
