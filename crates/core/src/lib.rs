//! Core types and decision logic for the Gatehouse authorising proxy.
//!
//! This crate holds everything the request path evaluates: the rule entries
//! fetched from the config agent ([`rules`]), the immutable published
//! [`snapshot::Snapshot`] and its lock-free [`snapshot::SnapshotHandle`],
//! the path [`classifier`] that decides whether a request is subject to
//! authorisation at all, and the [`engine`] that turns a request plus a
//! snapshot into an allow/deny [`engine::Decision`].
//!
//! Nothing in this crate performs I/O. Fetching, refreshing, and serving
//! live in the `gatehouse-appconfig` and `gatehouse-proxy` crates.

pub mod classifier;
pub mod engine;
pub mod rules;
pub mod snapshot;

pub use classifier::{Classification, PathClassifier};
pub use engine::{
    Decision, DenyReason, ForwardedForError, authorize, forwarded_for, select_forwarded_ip,
};
pub use rules::{BasicAuthEntry, RuleFragment, SharedTokenEntry};
pub use snapshot::{Snapshot, SnapshotHandle};
