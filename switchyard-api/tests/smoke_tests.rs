//! End-to-end smoke tests against a live PostgreSQL node.
//!
//! Run with `--features db-tests` and `SWITCHYARD_TEST_PG` pointing at a
//! writable node (`host:port` or a `postgres://` URL).

#![cfg(feature = "db-tests")]

use std::sync::Arc;

use switchyard_api::{ConnectionRouter, PgConnector, PgConnectorConfig};
use switchyard_core::{BookingPatch, StorageError, TopologyPush};
use switchyard_storage::TopologyStore;
use switchyard_test_utils::fixtures;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn pg_router() -> Result<ConnectionRouter, Box<dyn std::error::Error>> {
    let target = std::env::var("SWITCHYARD_TEST_PG").unwrap_or_else(|_| "localhost:5432".to_string());
    let topology = Arc::new(TopologyStore::in_memory());
    topology.update(&TopologyPush::new(target, Vec::new()))?;

    let config = PgConnectorConfig {
        user: std::env::var("SWITCHYARD_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
        password: std::env::var("SWITCHYARD_DB_PASSWORD").unwrap_or_default(),
        dbname: std::env::var("SWITCHYARD_DB_NAME").unwrap_or_else(|_| "trains".to_string()),
        ..PgConnectorConfig::default()
    };
    Ok(ConnectionRouter::new(topology, Arc::new(PgConnector::new(config))))
}

#[tokio::test]
async fn smoke_test_booking_chain() -> TestResult {
    let router = pg_router()?;
    let mut session = router.acquire_write().await?;
    session.ensure_schema().await?;

    let train = session.insert_train(&fixtures::new_train(1)).await?;
    let receipt = session
        .book_seat(&fixtures::new_booking(train.id, "smoke@example.com"))
        .await?;
    assert_eq!(receipt.seats_left, 0);

    let second = session
        .book_seat(&fixtures::new_booking(train.id, "late@example.com"))
        .await;
    assert!(matches!(second, Err(StorageError::Conflict { .. })));

    let renamed = session
        .update_booking(
            receipt.booking.id,
            &BookingPatch {
                user_credentials: "renamed@example.com".to_string(),
            },
        )
        .await?;
    assert_eq!(renamed.user_credentials, "renamed@example.com");

    let cancelled = session.cancel_booking(receipt.booking.id).await?;
    assert_eq!(cancelled.seats_left, 1);

    session.delete_train(train.id).await?;
    let gone = session.get_train(train.id).await;
    assert!(matches!(gone, Err(StorageError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn smoke_test_reads_fall_back_to_primary() -> TestResult {
    let router = pg_router()?;
    {
        let mut session = router.acquire_write().await?;
        session.ensure_schema().await?;
    }
    let mut session = router.acquire_read().await?;
    let _ = session.list_trains().await?;
    Ok(())
}
