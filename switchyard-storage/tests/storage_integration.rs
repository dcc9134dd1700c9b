//! Cross-module storage scenarios: persisted topology across restarts and
//! cache invalidation against a changing source of truth.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchyard_core::{Endpoint, TopologyPush};
use switchyard_storage::{
    cache_keys, InMemoryCacheBackend, InMemoryServiceRegistry, LmdbTopologyPersistence,
    ReadThroughCache, ServiceRegistry, TopologyStore,
};
use switchyard_test_utils::assertions::{assert_primary, assert_unknown};
use switchyard_test_utils::fixtures;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_restarted_store_routes_from_persisted_record() -> TestResult {
    let dir = tempfile::tempdir()?;

    {
        let store = TopologyStore::open(LmdbTopologyPersistence::open(dir.path())?)?;
        assert_unknown(&store.current());
        store.update(&fixtures::three_node_push())?;
        store.update(&TopologyPush::new("s1:5432", vec!["m:5432".to_string()]))?;
    }

    let store = TopologyStore::open(LmdbTopologyPersistence::open(dir.path())?)?;
    let snapshot = store.current();
    assert_primary(&snapshot, &Endpoint::new("s1", 5432));
    assert_eq!(snapshot.version(), Some(2));
    Ok(())
}

#[test]
fn test_rejected_push_is_not_persisted() -> TestResult {
    let dir = tempfile::tempdir()?;
    {
        let store = TopologyStore::open(LmdbTopologyPersistence::open(dir.path())?)?;
        store.update(&fixtures::three_node_push())?;
        assert!(store
            .update(&TopologyPush::new("m:5432", vec!["redis://x:1".to_string()]))
            .is_err());
    }

    let store = TopologyStore::open(LmdbTopologyPersistence::open(dir.path())?)?;
    assert_eq!(store.current().version(), Some(1));
    Ok(())
}

/// A write that invalidates its collection key is never followed by a read
/// that returns the pre-write value.
#[tokio::test]
async fn test_read_after_invalidate_sees_new_value() -> TestResult {
    let cache = ReadThroughCache::with_defaults(Arc::new(InMemoryCacheBackend::new()));
    let replica = Arc::new(Mutex::new(vec!["Lisbon - Porto".to_string()]));
    let loads = Arc::new(AtomicU32::new(0));

    let read = || {
        let replica = Arc::clone(&replica);
        let loads = Arc::clone(&loads);
        cache.get_or_load(cache_keys::TRAINS, Duration::from_secs(60), move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            let rows = replica
                .lock()
                .map_err(|_| std::io::Error::other("poisoned"))?
                .clone();
            Ok::<_, std::io::Error>(rows)
        })
    };

    assert_eq!(read().await?, vec!["Lisbon - Porto".to_string()]);
    assert_eq!(read().await?, vec!["Lisbon - Porto".to_string()]);
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    replica
        .lock()
        .map_err(|_| std::io::Error::other("poisoned"))?
        .push("Porto - Faro".to_string());
    cache.invalidate(cache_keys::TRAINS).await;

    let after = read().await?;
    assert_eq!(after.len(), 2);
    assert_eq!(loads.load(Ordering::SeqCst), 2);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    Ok(())
}

#[tokio::test]
async fn test_registry_membership_for_push_fanout() -> TestResult {
    let registry = InMemoryServiceRegistry::new();
    registry.register("10.0.0.1:8000").await?;
    registry.register("10.0.0.2:8000").await?;
    registry.register("10.0.0.1:8000").await?;

    let members = registry.members().await?;
    assert_eq!(members.len(), 2);
    assert_eq!(members[0], "10.0.0.1:8000");
    Ok(())
}
