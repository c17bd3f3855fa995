use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use ipnetwork::IpNetwork;

use crate::rules::{BasicAuthEntry, RuleFragment, SharedTokenEntry};

/// An immutable, versioned copy of the full authorisation rule set.
///
/// Snapshots are built by merging profile fragments and never mutate after
/// publication. Request handlers hold an `Arc<Snapshot>` for the whole
/// request, so a concurrent publication can never mix rules from two
/// versions within one request.
#[derive(Debug, Default)]
pub struct Snapshot {
    version: u64,
    ip_ranges: Vec<IpNetwork>,
    basic_auth: Vec<BasicAuthEntry>,
    shared_tokens: Vec<SharedTokenEntry>,
}

impl Snapshot {
    /// The empty rule set, version 0. Denies everything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge profile fragments into a new snapshot with the given version.
    ///
    /// IP ranges are unioned with duplicates collapsed (first occurrence
    /// wins the position); basic-auth and shared-token entries are
    /// concatenated in encounter order across fragments.
    pub fn from_fragments(version: u64, fragments: &[RuleFragment]) -> Self {
        let mut seen = HashSet::new();
        let mut ip_ranges = Vec::new();
        let mut basic_auth = Vec::new();
        let mut shared_tokens = Vec::new();

        for fragment in fragments {
            for range in &fragment.ip_ranges {
                if seen.insert(*range) {
                    ip_ranges.push(*range);
                }
            }
            basic_auth.extend(fragment.basic_auth.iter().cloned());
            shared_tokens.extend(fragment.shared_tokens.iter().cloned());
        }

        Self {
            version,
            ip_ranges,
            basic_auth,
            shared_tokens,
        }
    }

    /// Version number assigned at publication.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Allow-listed client networks.
    pub fn ip_ranges(&self) -> &[IpNetwork] {
        &self.ip_ranges
    }

    /// Path-scoped basic credentials.
    pub fn basic_auth(&self) -> &[BasicAuthEntry] {
        &self.basic_auth
    }

    /// Shared header tokens.
    pub fn shared_tokens(&self) -> &[SharedTokenEntry] {
        &self.shared_tokens
    }

    /// Whether the snapshot carries no rules at all.
    pub fn is_empty(&self) -> bool {
        self.ip_ranges.is_empty() && self.basic_auth.is_empty() && self.shared_tokens.is_empty()
    }

    /// Whether any allow-listed range covers the given address.
    pub fn covers_ip(&self, ip: IpAddr) -> bool {
        self.ip_ranges.iter().any(|range| range.contains(ip))
    }
}

/// Shared handle to the currently published [`Snapshot`].
///
/// Readers call [`load`](Self::load) once per request and keep the returned
/// `Arc` for the request's lifetime; publication is a single atomic pointer
/// swap, so readers never block and never observe a partially built rule
/// set. Old snapshots are freed when the last in-flight request drops its
/// `Arc`.
#[derive(Debug)]
pub struct SnapshotHandle {
    current: ArcSwap<Snapshot>,
}

impl SnapshotHandle {
    /// Create a handle holding the empty snapshot (version 0).
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
        }
    }

    /// The currently published snapshot.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Version of the currently published snapshot.
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    /// Merge the fragments and publish the result as the next version.
    ///
    /// Returns the version assigned to the new snapshot. Versions increase
    /// by one per publication, so they are monotonically non-decreasing for
    /// every reader of this handle.
    pub fn publish(&self, fragments: &[RuleFragment]) -> u64 {
        let next = self.current.load().version + 1;
        self.current
            .store(Arc::new(Snapshot::from_fragments(next, fragments)));
        next
    }
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> IpNetwork {
        s.parse().unwrap()
    }

    fn fragment_with_ranges(ranges: &[&str]) -> RuleFragment {
        RuleFragment {
            ip_ranges: ranges.iter().map(|r| range(r)).collect(),
            ..RuleFragment::default()
        }
    }

    #[test]
    fn merge_unions_ranges_and_collapses_duplicates() {
        let a = fragment_with_ranges(&["10.0.0.0/8", "192.0.2.0/24"]);
        let b = fragment_with_ranges(&["192.0.2.0/24", "203.0.113.0/24"]);

        let snap = Snapshot::from_fragments(1, &[a, b]);
        assert_eq!(
            snap.ip_ranges(),
            &[
                range("10.0.0.0/8"),
                range("192.0.2.0/24"),
                range("203.0.113.0/24"),
            ]
        );
    }

    #[test]
    fn merge_concatenates_entries_in_encounter_order() {
        let a = RuleFragment {
            basic_auth: vec![BasicAuthEntry {
                path_prefix: "/a/".to_owned(),
                username: "first".to_owned(),
                password: "p".to_owned(),
            }],
            ..RuleFragment::default()
        };
        let b = RuleFragment {
            basic_auth: vec![BasicAuthEntry {
                path_prefix: "/b/".to_owned(),
                username: "second".to_owned(),
                password: "p".to_owned(),
            }],
            ..RuleFragment::default()
        };

        let snap = Snapshot::from_fragments(1, &[a, b]);
        assert_eq!(snap.basic_auth()[0].username, "first");
        assert_eq!(snap.basic_auth()[1].username, "second");
    }

    #[test]
    fn covers_ip_checks_all_ranges() {
        let snap = Snapshot::from_fragments(1, &[fragment_with_ranges(&["10.0.0.0/8"])]);
        assert!(snap.covers_ip("10.1.2.3".parse().unwrap()));
        assert!(!snap.covers_ip("11.1.2.3".parse().unwrap()));
    }

    #[test]
    fn covers_ip_handles_ipv6_ranges() {
        let snap = Snapshot::from_fragments(1, &[fragment_with_ranges(&["2001:db8::/32"])]);
        assert!(snap.covers_ip("2001:db8::1".parse().unwrap()));
        assert!(!snap.covers_ip("2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn publish_increments_version() {
        let handle = SnapshotHandle::new();
        assert_eq!(handle.version(), 0);

        assert_eq!(handle.publish(&[fragment_with_ranges(&["10.0.0.0/8"])]), 1);
        assert_eq!(handle.version(), 1);

        assert_eq!(handle.publish(&[]), 2);
        assert_eq!(handle.version(), 2);
    }

    #[test]
    fn readers_keep_their_snapshot_across_publication() {
        let handle = SnapshotHandle::new();
        handle.publish(&[fragment_with_ranges(&["10.0.0.0/8"])]);

        let held = handle.load();
        handle.publish(&[]);

        // The in-flight reader still sees version 1 with its ranges intact,
        // while new loads observe the empty version 2.
        assert_eq!(held.version(), 1);
        assert!(held.covers_ip("10.0.0.1".parse().unwrap()));
        assert_eq!(handle.load().version(), 2);
        assert!(handle.load().is_empty());
    }
}
