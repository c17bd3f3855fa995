use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use http::header;
use tower_http::trace::TraceLayer;
use tracing::warn;

use gatehouse_core::{Classification, Decision, PathClassifier, SnapshotHandle, authorize};

use crate::access_log::RequestLog;
use crate::config::ProxyConfig;
use crate::denial;
use crate::upstream::{self, UpstreamClient, UpstreamError};

/// Shared state for the request handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ProxyConfig>,
    classifier: Arc<PathClassifier>,
    snapshots: Arc<SnapshotHandle>,
    upstream: UpstreamClient,
}

impl AppState {
    /// Assemble the data plane from its configuration and the shared
    /// snapshot handle published to by the refresher.
    pub fn new(
        config: ProxyConfig,
        classifier: PathClassifier,
        snapshots: Arc<SnapshotHandle>,
    ) -> Self {
        let upstream = UpstreamClient::new(config.connect_timeout, config.read_timeout);
        Self {
            config: Arc::new(config),
            classifier: Arc::new(classifier),
            snapshots,
            upstream,
        }
    }
}

/// Build the proxy router: every method and path falls through to the
/// single proxy handler.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(proxy_request)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// The per-request pipeline: snapshot → classify → authorise → forward.
///
/// The snapshot reference is loaded exactly once and used for every check,
/// so a concurrent rule publication cannot produce a mixed decision.
async fn proxy_request(State(state): State<AppState>, req: Request) -> Response {
    let snapshot = state.snapshots.load();
    let path = req.uri().path().to_owned();
    let log = RequestLog::begin(
        req.method(),
        &path,
        req.headers(),
        snapshot.version(),
        state.config.xff_index,
    );

    let decision = match state.classifier.classify(&path) {
        Classification::Bypass => None,
        Classification::Apply => Some(authorize(
            &path,
            req.headers(),
            &snapshot,
            state.config.xff_index,
        )),
    };

    if let Some(Decision::Deny(reason)) = decision {
        log.denied(reason);
        return denial::denial_response(
            &state.config.contact_email_label,
            &state.config.contact_email,
        );
    }

    let origin_req = match upstream::build_origin_request(
        &state.config.origin_scheme,
        &state.config.origin_authority,
        req,
    ) {
        Ok(origin_req) => origin_req,
        Err(error) => {
            warn!(%error, "failed to build origin request");
            log.origin_failure(error.client_status().as_u16());
            return denial::bad_gateway_response();
        }
    };

    match state.upstream.forward(origin_req).await {
        Ok(mut response) => {
            upstream::strip_hop_by_hop(response.headers_mut());
            let status = response.status().as_u16();
            let bytes = content_length(&response);
            if decision.is_some() {
                log.allowed(status, bytes);
            } else {
                log.bypassed(status, bytes);
            }
            response
        }
        Err(error) => {
            warn!(%error, "origin request failed");
            log.origin_failure(error.client_status().as_u16());
            match error {
                UpstreamError::Timeout => denial::gateway_timeout_response(),
                _ => denial::bad_gateway_response(),
            }
        }
    }
}

/// Declared response size, when the origin supplied one.
fn content_length(response: &Response<Body>) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
