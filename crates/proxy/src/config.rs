use std::time::Duration;

/// Data-plane settings, captured once at start-up.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Origin authority (`host` or `host:port`) every request is sent to.
    pub origin_authority: String,
    /// Scheme for origin requests: `http` or `https`.
    pub origin_scheme: String,
    /// Index into the `X-Forwarded-For` list selecting the client address.
    /// Negative values count from the right; `-2` trusts exactly one
    /// fronting hop.
    pub xff_index: i64,
    /// Contact address shown on the denial page. Empty hides the contact line.
    pub contact_email: String,
    /// Display name for the contact link; falls back to the address.
    pub contact_email_label: String,
    /// TCP connect timeout towards the origin.
    pub connect_timeout: Duration,
    /// Time allowed for the origin to produce response headers.
    pub read_timeout: Duration,
}
