//! Parsers for cluster info responses (`asinfo -v <command>`).
//!
//! Missing entries count as zero; present but malformed numbers are errors.

use crate::report::{ReportError, parse_number};

/// Substring between `start` and the next `end` after it.
fn between<'a>(text: &'a str, start: &str, end: char) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let rest = text.get(from..)?;
    let to = rest.find(end)?;
    rest.get(..to)
}

/// Object count of one set from a `sets` response.
///
/// Looks for `ns=<namespace>:set=<set>:objects=<n>:`.
pub fn set_object_count(info: &str, namespace: &str, set: &str) -> Result<u64, ReportError> {
    let key = format!("ns={namespace}:set={set}:objects=");
    between(info, &key, ':').map_or(Ok(0), |value| parse_number(&key, value))
}

/// Sum of `objects=` over every set of `namespace` in a `sets` response.
pub fn namespace_object_count(info: &str, namespace: &str) -> Result<u64, ReportError> {
    let ns_key = format!("ns={namespace}:");
    info.split(';')
        .filter(|entry| entry.starts_with(&ns_key))
        .flat_map(|entry| entry.split(':'))
        .filter_map(|property| property.strip_prefix("objects="))
        .try_fold(0u64, |total, value| {
            parse_number::<u64>("objects=", value).map(|count| total.saturating_add(count))
        })
}

/// `master_objects` from a `namespace/<ns>` response.
pub fn master_objects(info: &str) -> Result<u64, ReportError> {
    between(info, "master_objects=", ';')
        .map_or(Ok(0), |value| parse_number("master_objects=", value))
}

/// `replication-factor` from a `get-config:context=namespace` response; 1 when absent.
pub fn replication_factor(info: &str) -> Result<u64, ReportError> {
    between(info, "replication-factor=", ';')
        .map_or(Ok(1), |value| parse_number("replication-factor=", value))
}

/// `cluster_size` from a `statistics` response; 1 when absent.
pub fn cluster_size(info: &str) -> Result<u64, ReportError> {
    between(info, "cluster_size=", ';').map_or(Ok(1), |value| parse_number("cluster_size=", value))
}

/// Peer addresses from a `services` response (`host:port;host:port`).
///
/// IPv6 hosts may be bracketed; entries without a numeric port are skipped.
#[must_use]
pub fn peer_addresses(info: &str) -> Vec<(String, u16)> {
    info.split(';')
        .map(str::trim)
        .filter_map(|entry| {
            let (host, port) = entry.rsplit_once(':')?;
            let port = port.parse().ok()?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            (!host.is_empty()).then(|| (host.to_string(), port))
        })
        .collect()
}

/// Per-node set count corrected for replication.
///
/// The raw count on one node includes replica copies, so it is divided by
/// `min(node_count, replication_factor)`.
#[must_use]
pub fn per_node_logical_count(raw_count: u64, replication_factor: u64, node_count: u64) -> u64 {
    let effective = replication_factor.min(node_count).max(1);
    raw_count / effective
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETS: &str = "ns=test:set=users:objects=120:tombstones=0:memory_data_bytes=0;\
        ns=test:set=orders:objects=30:tombstones=0;\
        ns=bar:set=users:objects=7:tombstones=0;";

    #[test]
    fn set_counts() -> Result<(), ReportError> {
        assert_eq!(set_object_count(SETS, "test", "users")?, 120);
        assert_eq!(set_object_count(SETS, "bar", "users")?, 7);
        assert_eq!(set_object_count(SETS, "test", "missing")?, 0);
        Ok(())
    }

    #[test]
    fn namespace_counts_sum_all_sets() -> Result<(), ReportError> {
        assert_eq!(namespace_object_count(SETS, "test")?, 150);
        assert_eq!(namespace_object_count(SETS, "nope")?, 0);
        Ok(())
    }

    #[test]
    fn namespace_stats() -> Result<(), ReportError> {
        let info = "objects=40;master_objects=20;prole_objects=20;";
        assert_eq!(master_objects(info)?, 20);
        assert_eq!(master_objects("objects=1;")?, 0);
        assert_eq!(replication_factor("replication-factor=2;memory-size=1")?, 2);
        assert_eq!(replication_factor("memory-size=1;")?, 1);
        assert_eq!(cluster_size("cluster_key=ABC;cluster_size=3;cluster_integrity=true")?, 3);
        assert_eq!(cluster_size("uptime=10;")?, 1);
        Ok(())
    }

    #[test]
    fn malformed_count_is_an_error() {
        assert!(matches!(
            master_objects("master_objects=many;"),
            Err(ReportError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn peers_are_parsed_and_malformed_entries_skipped() {
        let peers = peer_addresses("10.0.0.2:3000;[fe80::1]:3000;bogus;10.0.0.3:x;\n");
        assert_eq!(
            peers,
            vec![
                ("10.0.0.2".to_string(), 3000),
                ("fe80::1".to_string(), 3000),
            ]
        );
        assert!(peer_addresses("").is_empty());
    }

    #[test]
    fn logical_count_divides_by_effective_factor() {
        assert_eq!(per_node_logical_count(200, 2, 3), 100);
        assert_eq!(per_node_logical_count(200, 3, 1), 200);
        assert_eq!(per_node_logical_count(200, 0, 0), 200);
    }
}
