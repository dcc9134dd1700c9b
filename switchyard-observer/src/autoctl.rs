//! Cluster manager access.
//!
//! The pg_auto_failover monitor reports node roles as a pipe-separated table
//! (`pg_autoctl show state`):
//!
//! ```text
//!   Name |  Node |      Host:Port |       TLI: LSN |   Connection |      Reported State |      Assigned State
//! -------+-------+----------------+----------------+--------------+---------------------+--------------------
//! node_1 |     1 |  pg-node1:5432 |   1: 0/4000060 |   read-write |             primary |             primary
//! node_2 |     2 |  pg-node2:5432 |   1: 0/4000060 |    read-only |           secondary |           secondary
//! ```
//!
//! Parsing is kept apart from running the command so it can be tested on
//! captured text.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::{ClusterTopology, Endpoint};
use tokio::process::Command;

use crate::error::{ObserverError, ObserverResult, ParseError};

const HOST_PORT_COLUMN: usize = 2;
const REPORTED_STATE_COLUMN: usize = 5;

/// Source of the current cluster roles.
#[async_trait]
pub trait ClusterManager: Send + Sync {
    async fn topology(&self) -> ObserverResult<ClusterTopology>;
}

// ============================================================================
// PARSER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRole {
    Primary,
    Secondary,
}

/// Map a reported state to a routing role. Transitional states (catching up,
/// draining, demoted...) take no traffic.
fn role_for_state(state: &str) -> Option<NodeRole> {
    match state {
        "primary" | "wait_primary" | "single" => Some(NodeRole::Primary),
        "secondary" => Some(NodeRole::Secondary),
        _ => None,
    }
}

/// Parse `pg_autoctl show state` output into a typed topology.
///
/// Lines without enough pipe-separated columns and the header row are
/// skipped. Exactly one primary must be reported.
pub fn parse_autoctl_state(output: &str) -> Result<ClusterTopology, ParseError> {
    let mut primary: Option<Endpoint> = None;
    let mut secondaries = Vec::new();

    for (idx, line) in output.lines().enumerate() {
        let columns: Vec<&str> = line.split('|').map(str::trim).collect();
        if columns.len() <= REPORTED_STATE_COLUMN {
            continue;
        }
        let host_port = columns[HOST_PORT_COLUMN];
        if host_port.eq_ignore_ascii_case("host:port") {
            continue;
        }
        let Some(role) = role_for_state(columns[REPORTED_STATE_COLUMN]) else {
            tracing::debug!(line = idx + 1, state = columns[REPORTED_STATE_COLUMN], "Skipping node");
            continue;
        };

        let endpoint: Endpoint = host_port.parse().map_err(|e: switchyard_core::TopologyError| {
            ParseError::InvalidEndpoint {
                line: idx + 1,
                value: host_port.to_string(),
                reason: e.to_string(),
            }
        })?;

        match role {
            NodeRole::Primary => {
                if let Some(first) = &primary {
                    return Err(ParseError::MultiplePrimaries {
                        first: first.to_string(),
                        second: endpoint.to_string(),
                    });
                }
                primary = Some(endpoint);
            }
            NodeRole::Secondary => secondaries.push(endpoint),
        }
    }

    let primary = primary.ok_or(ParseError::NoPrimary)?;
    Ok(ClusterTopology::new(primary, secondaries))
}

// ============================================================================
// PG_AUTOCTL
// ============================================================================

/// Runs the monitor's state command as a child process.
#[derive(Debug, Clone)]
pub struct PgAutoctlManager {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl PgAutoctlManager {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String], timeout: Duration) -> ObserverResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ObserverError::Config("empty cluster manager command".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    async fn run(&self) -> ObserverResult<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| ObserverError::Command {
            reason: format!("{}: {}", self.program, e),
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ObserverError::CommandTimeout)?
            .map_err(|e| ObserverError::Command {
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ObserverError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ClusterManager for PgAutoctlManager {
    async fn topology(&self) -> ObserverResult<ClusterTopology> {
        let output = self.run().await?;
        Ok(parse_autoctl_state(&output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use switchyard_test_utils::autoctl::{render_state, NodeRow};

    #[test]
    fn test_parses_primary_and_secondaries() -> Result<(), ParseError> {
        let output = render_state(&[
            NodeRow::new("node_1", "pg-node1:5432", "primary"),
            NodeRow::new("node_2", "pg-node2:5432", "secondary"),
            NodeRow::new("node_3", "pg-node3:5433", "secondary"),
        ]);

        let topology = parse_autoctl_state(&output)?;
        assert_eq!(topology.primary, Some(Endpoint::new("pg-node1", 5432)));
        assert_eq!(
            topology.secondaries,
            vec![Endpoint::new("pg-node2", 5432), Endpoint::new("pg-node3", 5433)]
        );
        Ok(())
    }

    #[test]
    fn test_failover_states_count_as_primary() -> Result<(), ParseError> {
        for state in ["wait_primary", "single"] {
            let output = render_state(&[NodeRow::new("node_2", "pg-node2:5432", state)]);
            let topology = parse_autoctl_state(&output)?;
            assert_eq!(topology.primary, Some(Endpoint::new("pg-node2", 5432)));
            assert!(topology.secondaries.is_empty());
        }
        Ok(())
    }

    #[test]
    fn test_transitional_nodes_are_ignored() -> Result<(), ParseError> {
        let output = render_state(&[
            NodeRow::new("node_1", "pg-node1:5432", "primary"),
            NodeRow::new("node_2", "pg-node2:5432", "catchingup"),
            NodeRow::new("node_3", "pg-node3:5432", "demoted"),
        ]);
        let topology = parse_autoctl_state(&output)?;
        assert!(topology.secondaries.is_empty());
        Ok(())
    }

    #[test]
    fn test_no_primary_is_an_error() {
        let output = render_state(&[NodeRow::new("node_2", "pg-node2:5432", "secondary")]);
        assert_eq!(parse_autoctl_state(&output), Err(ParseError::NoPrimary));
        assert_eq!(parse_autoctl_state(""), Err(ParseError::NoPrimary));
    }

    #[test]
    fn test_two_primaries_is_an_error() {
        let output = render_state(&[
            NodeRow::new("node_1", "pg-node1:5432", "primary"),
            NodeRow::new("node_2", "pg-node2:5432", "primary"),
        ]);
        assert!(matches!(
            parse_autoctl_state(&output),
            Err(ParseError::MultiplePrimaries { .. })
        ));
    }

    #[test]
    fn test_bad_host_port_reports_line() {
        let output = render_state(&[NodeRow::new("node_1", "pg-node1:notaport", "primary")]);
        match parse_autoctl_state(&output) {
            Err(ParseError::InvalidEndpoint { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected InvalidEndpoint, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_program_is_a_command_error() -> ObserverResult<()> {
        let manager = PgAutoctlManager::new(
            &["/nonexistent/pg_autoctl".to_string()],
            Duration::from_secs(1),
        )?;
        assert!(matches!(
            manager.topology().await,
            Err(ObserverError::Command { .. })
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_reported() -> ObserverResult<()> {
        let command = ["sh", "-c", "echo monitor down >&2; exit 3"].map(String::from);
        let manager = PgAutoctlManager::new(&command, Duration::from_secs(5))?;
        match manager.topology().await {
            Err(ObserverError::CommandFailed { stderr, .. }) => assert_eq!(stderr, "monitor down"),
            other => panic!("expected CommandFailed, got {:?}", other),
        }
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_is_parsed() -> ObserverResult<()> {
        let table = render_state(&[
            NodeRow::new("node_1", "db-a:5432", "primary"),
            NodeRow::new("node_2", "db-b:5432", "secondary"),
        ]);
        let command = ["printf".to_string(), "%s".to_string(), table];
        let manager = PgAutoctlManager::new(&command, Duration::from_secs(5))?;
        let topology = manager.topology().await?;
        assert_eq!(topology.primary, Some(Endpoint::new("db-a", 5432)));
        Ok(())
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(matches!(
            PgAutoctlManager::new(&[], Duration::from_secs(1)),
            Err(ObserverError::Config(_))
        ));
    }

    fn arb_node() -> impl Strategy<Value = (String, u16)> {
        ("[a-z][a-z0-9-]{0,12}", 1024u16..65535)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Any table with one primary yields that primary and every secondary, in order.
        #[test]
        fn prop_single_primary_roundtrips(
            primary in arb_node(),
            secondaries in prop::collection::vec(arb_node(), 0..5),
        ) {
            let mut rows = vec![NodeRow::new("node_0", &format!("{}:{}", primary.0, primary.1), "primary")];
            for (idx, (host, port)) in secondaries.iter().enumerate() {
                rows.push(NodeRow::new(&format!("node_{}", idx + 1), &format!("{}:{}", host, port), "secondary"));
            }

            let topology = parse_autoctl_state(&render_state(&rows))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(topology.primary, Some(Endpoint::new(primary.0, primary.1)));
            let expected: Vec<Endpoint> = secondaries
                .into_iter()
                .map(|(host, port)| Endpoint::new(host, port))
                .collect();
            prop_assert_eq!(topology.secondaries, expected);
        }
    }
}
