use std::time::Instant;

use http::{HeaderMap, Method};
use tracing::info;
use uuid::Uuid;

use gatehouse_core::{DenyReason, forwarded_for, select_forwarded_ip};

/// Inbound headers consulted for an existing correlation identifier.
const CORRELATION_HEADERS: [&str; 2] = ["x-request-id", "x-correlation-id"];

/// Per-request access log record.
///
/// Created at the top of the handler and completed exactly once by one of
/// the outcome methods. If the handler future is dropped before completion
/// — the client went away while the origin call was in flight — the `Drop`
/// impl records the request as `client_abort` instead.
pub struct RequestLog {
    request_id: String,
    client: String,
    method: Method,
    path: String,
    snapshot_version: u64,
    started: Instant,
    completed: bool,
}

impl RequestLog {
    /// Capture request identity before any await point.
    ///
    /// The client field is the address selected by the X-Forwarded-For index
    /// rule; when extraction fails it falls back to the raw header value so
    /// the log still shows what the caller presented.
    pub fn begin(
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        snapshot_version: u64,
        xff_index: i64,
    ) -> Self {
        let request_id = CORRELATION_HEADERS
            .iter()
            .find_map(|name| headers.get(*name)?.to_str().ok())
            .map_or_else(|| Uuid::new_v4().to_string(), ToOwned::to_owned);

        let client = match select_forwarded_ip(forwarded_for(headers), xff_index) {
            Ok(ip) => ip.to_string(),
            Err(_) => forwarded_for(headers).unwrap_or("-").to_owned(),
        };

        Self {
            request_id,
            client,
            method: method.clone(),
            path: path.to_owned(),
            snapshot_version,
            started: Instant::now(),
            completed: false,
        }
    }

    /// Request forwarded after passing authorisation.
    pub fn allowed(mut self, status: u16, bytes: Option<u64>) {
        self.emit("allow", Some(status), bytes);
    }

    /// Request forwarded without authorisation (public path or filter off).
    pub fn bypassed(mut self, status: u16, bytes: Option<u64>) {
        self.emit("bypass", Some(status), bytes);
    }

    /// Request rejected with the denial page.
    pub fn denied(mut self, reason: DenyReason) {
        self.emit(reason.as_str(), Some(403), None);
    }

    /// Origin could not be reached or did not answer in time.
    pub fn origin_failure(mut self, status: u16) {
        self.emit("origin_failure", Some(status), None);
    }

    fn emit(&mut self, decision: &str, status: Option<u16>, bytes: Option<u64>) {
        self.completed = true;
        info!(
            target: "gatehouse::access",
            request_id = %self.request_id,
            client = %self.client,
            method = %self.method,
            path = %self.path,
            decision,
            status = status.map(u64::from),
            bytes,
            elapsed_ms = elapsed_ms(self.started),
            snapshot_version = self.snapshot_version,
            "request complete"
        );
    }
}

impl Drop for RequestLog {
    fn drop(&mut self) {
        if !self.completed {
            info!(
                target: "gatehouse::access",
                request_id = %self.request_id,
                client = %self.client,
                method = %self.method,
                path = %self.path,
                decision = "client_abort",
                elapsed_ms = elapsed_ms(self.started),
                snapshot_version = self.snapshot_version,
                "client disconnected before completion"
            );
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
