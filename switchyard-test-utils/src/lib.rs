//! Switchyard Test Utilities
//!
//! Shared test infrastructure for the switchyard workspace:
//! - Proptest generators for topology and booking types
//! - Fixtures for common scenarios
//! - A renderer for `pg_autoctl show state` output
//! - Custom assertions

pub use switchyard_core::{
    ClusterTopology, ConnectionString, ConnectionTemplate, Endpoint, NewBooking, NewTrain,
    TopologyPush, TopologyRecord, TopologySnapshot, DEFAULT_PG_PORT, MAX_SEATS,
};

pub use generators::*;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for switchyard value types.

    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;

    /// Generate a DNS-style host name.
    pub fn arb_host() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z][a-z0-9-]{0,14}",
            (0u8..=255, 0u8..=255).prop_map(|(a, b)| format!("10.0.{}.{}", a, b)),
        ]
    }

    /// Generate an endpoint with a non-zero port.
    pub fn arb_endpoint() -> impl Strategy<Value = Endpoint> {
        (arb_host(), 1u16..=u16::MAX).prop_map(|(host, port)| Endpoint::new(host, port))
    }

    /// Generate connection string text in canonical form: either a bare
    /// `host:port` or a rendered `postgresql://` URL. Parsing the result keeps
    /// the text unchanged.
    pub fn arb_connection_text() -> impl Strategy<Value = String> {
        (arb_endpoint(), any::<bool>()).prop_map(|(endpoint, as_url)| {
            if as_url {
                ConnectionTemplate::new("postgres", "trains")
                    .render(&endpoint)
                    .to_string()
            } else {
                endpoint.to_string()
            }
        })
    }

    /// Generate a valid topology push with up to four secondaries.
    pub fn arb_topology_push() -> impl Strategy<Value = TopologyPush> {
        (
            arb_connection_text(),
            prop::collection::vec(arb_connection_text(), 0..4),
        )
            .prop_map(|(master, slaves)| TopologyPush::new(master, slaves))
    }

    /// Generate a cluster topology; roughly one in five has no primary.
    pub fn arb_cluster_topology() -> impl Strategy<Value = ClusterTopology> {
        (
            prop::option::weighted(0.8, arb_endpoint()),
            prop::collection::vec(arb_endpoint(), 0..4),
        )
            .prop_map(|(primary, secondaries)| ClusterTopology {
                primary,
                secondaries,
            })
    }

    /// Generate a timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Generate a train that passes validation.
    pub fn arb_new_train() -> impl Strategy<Value = NewTrain> {
        (
            "[A-Z][a-z]{2,12} - [A-Z][a-z]{2,12}",
            arb_timestamp(),
            1i64..48,
            0i32..=MAX_SEATS,
        )
            .prop_map(|(route, departure_time, hours, available_seats)| NewTrain {
                route,
                departure_time,
                arrival_time: departure_time + Duration::hours(hours),
                available_seats,
            })
    }

    /// Generate user credentials that pass validation.
    pub fn arb_credentials() -> impl Strategy<Value = String> {
        "[a-z]{3,10}@[a-z]{3,8}\\.com"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};

    /// Template used by the observer in tests.
    pub fn template() -> ConnectionTemplate {
        ConnectionTemplate::new("postgres", "trains")
    }

    /// Primary `m:5432` with secondaries `s1:5432` and `s2:5432`.
    pub fn three_node_push() -> TopologyPush {
        TopologyPush::new("m:5432", vec!["s1:5432".to_string(), "s2:5432".to_string()])
    }

    pub fn three_node_topology() -> ClusterTopology {
        ClusterTopology::new(
            Endpoint::new("m", 5432),
            vec![Endpoint::new("s1", 5432), Endpoint::new("s2", 5432)],
        )
    }

    /// A train leaving 2025-03-01 08:00 UTC with `seats` free seats.
    pub fn new_train(seats: i32) -> NewTrain {
        let departure_time = Utc
            .with_ymd_and_hms(2025, 3, 1, 8, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        NewTrain {
            route: "Lisbon - Porto".to_string(),
            departure_time,
            arrival_time: departure_time + chrono::Duration::hours(3),
            available_seats: seats,
        }
    }

    pub fn new_booking(train_id: i32, user: &str) -> NewBooking {
        NewBooking {
            train_id,
            user_credentials: user.to_string(),
        }
    }
}

// ============================================================================
// CLUSTER MANAGER OUTPUT
// ============================================================================

pub mod autoctl {
    //! Renders text in the layout `pg_autoctl show state` prints.

    /// One node row: name, `host:port`, reported state.
    #[derive(Debug, Clone)]
    pub struct NodeRow {
        pub name: String,
        pub host_port: String,
        pub reported_state: String,
    }

    impl NodeRow {
        pub fn new(name: &str, host_port: &str, reported_state: &str) -> Self {
            Self {
                name: name.to_string(),
                host_port: host_port.to_string(),
                reported_state: reported_state.to_string(),
            }
        }
    }

    /// Render a state table with a header, a separator line and one row per node.
    pub fn render_state(rows: &[NodeRow]) -> String {
        let mut out = String::from(
            "  Name |  Node |      Host:Port |       TLI: LSN |   Connection |      Reported State |      Assigned State\n\
             -------+-------+----------------+----------------+--------------+---------------------+--------------------\n",
        );
        for (idx, row) in rows.iter().enumerate() {
            let connection = if row.reported_state.contains("primary") {
                "read-write"
            } else {
                "read-only"
            };
            out.push_str(&format!(
                "{:>6} | {:>5} | {:>14} | {:>14} | {:>12} | {:>19} | {:>19}\n",
                row.name,
                idx + 1,
                row.host_port,
                "1: 0/4000060",
                connection,
                row.reported_state,
                row.reported_state,
            ));
        }
        out
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for topology snapshots.

    use super::*;

    /// Assert that the snapshot is known and its primary targets `expected`.
    #[track_caller]
    pub fn assert_primary(snapshot: &TopologySnapshot, expected: &Endpoint) {
        match snapshot.record() {
            Some(record) => assert_eq!(
                record.primary.endpoint(),
                expected,
                "Wrong primary in topology record"
            ),
            None => panic!("Expected known topology with primary {}, got Unknown", expected),
        }
    }

    /// Assert that the snapshot is `Unknown`.
    #[track_caller]
    pub fn assert_unknown(snapshot: &TopologySnapshot) {
        assert!(
            !snapshot.is_known(),
            "Expected Unknown topology, got: {:?}",
            snapshot
        );
    }
}
