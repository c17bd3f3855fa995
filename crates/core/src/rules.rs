use ipnetwork::IpNetwork;

/// A path-scoped HTTP Basic credential pair.
///
/// The entry applies to a request when [`path_prefix`](Self::path_prefix) is
/// a byte-wise prefix of the raw request path; `/` therefore matches every
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuthEntry {
    /// Raw path prefix the credentials are scoped to.
    pub path_prefix: String,
    /// Expected username.
    pub username: String,
    /// Expected password.
    pub password: String,
}

impl BasicAuthEntry {
    /// Whether this entry is in scope for the given raw request path.
    ///
    /// Matching is byte-exact and case-sensitive; no percent-decoding or
    /// other normalisation is applied.
    pub fn matches_path(&self, path: &str) -> bool {
        path.as_bytes().starts_with(self.path_prefix.as_bytes())
    }
}

/// A shared secret carried in a named request header.
///
/// Header names compare case-insensitively (they are looked up through
/// `http::HeaderName`); values compare byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedTokenEntry {
    /// Name of the header carrying the token.
    pub header_name: String,
    /// Expected token value.
    pub value: String,
}

/// One profile's contribution to the merged rule set.
///
/// Fragments are produced by the profile parser in `gatehouse-appconfig` and
/// merged into a [`crate::Snapshot`] by the refresher. A fragment with no
/// entries is valid and contributes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFragment {
    /// Allow-listed client networks.
    pub ip_ranges: Vec<IpNetwork>,
    /// Path-scoped basic credentials, in document order.
    pub basic_auth: Vec<BasicAuthEntry>,
    /// Shared header tokens, in document order.
    pub shared_tokens: Vec<SharedTokenEntry>,
}

impl RuleFragment {
    /// Whether the fragment carries no rules at all.
    pub fn is_empty(&self) -> bool {
        self.ip_ranges.is_empty() && self.basic_auth.is_empty() && self.shared_tokens.is_empty()
    }
}
