//! Rule-set retrieval for the Gatehouse sidecar.
//!
//! Profiles are named `application:environment:configuration` triples served
//! as YAML documents by a local AppConfig-style agent. The [`AgentClient`]
//! fetches and parses one profile into a `RuleFragment`; the [`Refresher`]
//! fetches every configured profile on a timer, merges the fragments, and
//! publishes immutable snapshots through a `SnapshotHandle` that the request
//! path reads lock-free.

mod client;
mod error;
mod parser;
mod refresher;

pub use client::{AgentClient, ProfileName};
pub use error::AppConfigError;
pub use refresher::Refresher;
