use std::time::Duration;

use axum::body::Body;
use http::header::{self, HeaderName, HeaderValue};
use http::{Request, Response, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::Error as LegacyError;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

/// Headers that are connection-scoped and must not cross the proxy,
/// in either direction.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::PROXY_AUTHORIZATION,
    header::PROXY_AUTHENTICATE,
    header::UPGRADE,
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut http::HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Failure to reach the origin or to build the origin request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The origin did not produce response headers within the read timeout.
    #[error("origin did not respond within the read timeout")]
    Timeout,

    /// The connection to the origin could not be established
    /// (refused, DNS, unroutable).
    #[error("origin connection failed: {0}")]
    Connect(#[source] LegacyError),

    /// The exchange failed after connecting.
    #[error("origin request failed: {0}")]
    Transport(#[source] LegacyError),

    /// The inbound request could not be rewritten into an origin request.
    #[error("failed to build origin request: {0}")]
    InvalidRequest(#[from] http::Error),
}

impl UpstreamError {
    /// The status the client receives for this failure.
    pub fn client_status(&self) -> StatusCode {
        match self {
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Connect(_) | Self::Transport(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

/// Streaming HTTP client towards the origin.
///
/// Built on the hyper connection pool rather than a higher-level client so
/// that request framing survives the hop: a client-supplied `Content-Length`
/// is forwarded verbatim and bodies stream through without buffering or
/// re-chunking.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client<HttpsConnector<HttpConnector>, Body>,
    read_timeout: Duration,
}

impl UpstreamClient {
    /// Build the client with its connect and response-header timeouts.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        connector.enforce_http(false);

        let tls = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector);

        Self {
            http: Client::builder(TokioExecutor::new()).build(tls),
            read_timeout,
        }
    }

    /// Send the request and wait for response headers, bounded by the read
    /// timeout. The response body keeps streaming after this returns.
    pub async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        match tokio::time::timeout(self.read_timeout, self.http.request(req)).await {
            Err(_) => Err(UpstreamError::Timeout),
            Ok(Err(e)) if e.is_connect() => Err(UpstreamError::Connect(e)),
            Ok(Err(e)) => Err(UpstreamError::Transport(e)),
            Ok(Ok(response)) => Ok(response.map(Body::new)),
        }
    }
}

/// Rewrite an inbound request into the request sent to the origin.
///
/// The path and query are kept byte for byte; the scheme and authority come
/// from configuration. `Host` is set to the origin authority, hop-by-hop
/// headers are dropped, and everything else — including `X-Forwarded-For`
/// and any client `Content-Length` — passes through untouched.
pub fn build_origin_request(
    scheme: &str,
    authority: &str,
    req: Request<Body>,
) -> Result<Request<Body>, UpstreamError> {
    let (mut parts, body) = req.into_parts();

    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    parts.uri = Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()?;

    strip_hop_by_hop(&mut parts.headers);
    parts.headers.insert(
        header::HOST,
        HeaderValue::from_str(authority).map_err(http::Error::from)?,
    );

    // The origin pool speaks HTTP/1.1 regardless of the inbound version.
    parts.version = http::Version::HTTP_11;
    parts.extensions.clear();

    Ok(Request::from_parts(parts, body))
}
