//! HTTP data plane for the Gatehouse sidecar.
//!
//! Every inbound request lands in a single fallback handler that loads the
//! current rule snapshot once, classifies the path, authorises when the
//! filter applies, and then either streams the request to the origin or
//! answers with the denial page. Origin failures map to neutral 502/504
//! bodies; authorisation failures never reveal which check denied.

pub mod access_log;
pub mod config;
pub mod denial;
pub mod router;
pub mod upstream;

pub use config::ProxyConfig;
pub use router::{AppState, router};
pub use upstream::{UpstreamClient, UpstreamError};
