use std::fmt;
use std::net::IpAddr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use thiserror::Error;

use crate::snapshot::Snapshot;

/// Header inspected for the client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Outcome of authorising one request against one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward the request to the origin.
    Allow,
    /// Reject the request with the denial page.
    Deny(DenyReason),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny(reason) => write!(f, "deny:{reason}"),
        }
    }
}

/// Why a request was denied. Logged, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No rule of any kind admitted the request.
    NoMatchingRule,
    /// Basic credentials were required for this path but absent or wrong.
    BasicAuthFailed,
    /// The X-Forwarded-For header was missing, too short, or unparseable.
    MalformedXForwardedFor,
    /// Shared tokens are configured but the request carried none that match.
    MissingSharedToken,
}

impl DenyReason {
    /// Stable lowercase identifier for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoMatchingRule => "no_matching_rule",
            Self::BasicAuthFailed => "basic_auth_failed",
            Self::MalformedXForwardedFor => "malformed_x_forwarded_for",
            Self::MissingSharedToken => "missing_shared_token",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to extract a client address from `X-Forwarded-For`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ForwardedForError {
    #[error("x-forwarded-for header is missing")]
    Missing,
    #[error("index {index} is out of range for {len} x-forwarded-for entries")]
    OutOfRange { index: i64, len: usize },
    #[error("x-forwarded-for entry is not an IP address")]
    NotAnAddress,
}

/// Select the client IP from an `X-Forwarded-For` header value.
///
/// The header is split on commas and indexed with Python-style semantics:
/// negative indices count from the right, so the default of `-2` selects the
/// entry appended by the hop before the fronting load balancer. That default
/// assumes exactly one trusted hop appends its own address; deployments with
/// more trusted hops must adjust `IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX`.
pub fn select_forwarded_ip(
    header: Option<&str>,
    index: i64,
) -> Result<IpAddr, ForwardedForError> {
    let raw = header.ok_or(ForwardedForError::Missing)?;
    let entries: Vec<&str> = raw.split(',').map(str::trim).collect();

    let len = i64::try_from(entries.len()).unwrap_or(i64::MAX);
    let position = if index < 0 { index + len } else { index };
    let entry = usize::try_from(position)
        .ok()
        .and_then(|p| entries.get(p))
        .ok_or(ForwardedForError::OutOfRange {
            index,
            len: entries.len(),
        })?;

    entry.parse().map_err(|_| ForwardedForError::NotAnAddress)
}

/// Authorise one request against one snapshot.
///
/// The three admission paths are independent and combined with short-circuit
/// OR: a trusted client network, path-scoped basic credentials, and a shared
/// header token each admit on their own. Deny reasons are tracked per check
/// and reported with the priority `BasicAuthFailed` > `MissingSharedToken` >
/// `MalformedXForwardedFor` > `NoMatchingRule`.
pub fn authorize(
    path: &str,
    headers: &HeaderMap,
    snapshot: &Snapshot,
    xff_index: i64,
) -> Decision {
    let mut basic_failed = false;
    let mut token_missing = false;
    let mut malformed_xff = false;

    // Client network check. A malformed or missing header only becomes the
    // deny reason when ranges are actually configured; a snapshot with no
    // rules must deny as NoMatchingRule.
    if !snapshot.ip_ranges().is_empty() {
        match select_forwarded_ip(forwarded_for(headers), xff_index) {
            Ok(ip) if snapshot.covers_ip(ip) => return Decision::Allow,
            Ok(_) => {}
            Err(_) => malformed_xff = true,
        }
    }

    // Basic credentials scoped to this path.
    let in_scope: Vec<_> = snapshot
        .basic_auth()
        .iter()
        .filter(|entry| entry.matches_path(path))
        .collect();
    if !in_scope.is_empty() {
        match basic_credentials(headers) {
            Some((username, password))
                if in_scope
                    .iter()
                    .any(|e| e.username == username && e.password == password) =>
            {
                return Decision::Allow;
            }
            _ => basic_failed = true,
        }
    }

    // Shared header tokens.
    if !snapshot.shared_tokens().is_empty() {
        let matched = snapshot
            .shared_tokens()
            .iter()
            .any(|entry| header_has_value(headers, &entry.header_name, &entry.value));
        if matched {
            return Decision::Allow;
        }
        token_missing = true;
    }

    let reason = if basic_failed {
        DenyReason::BasicAuthFailed
    } else if token_missing {
        DenyReason::MissingSharedToken
    } else if malformed_xff {
        DenyReason::MalformedXForwardedFor
    } else {
        DenyReason::NoMatchingRule
    };
    Decision::Deny(reason)
}

/// The raw `X-Forwarded-For` value, if present and readable.
pub fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_FORWARDED_FOR)?.to_str().ok()
}

/// Decode `Authorization: Basic <base64>` into `(username, password)`.
///
/// The scheme token compares case-insensitively; anything that fails to
/// decode is treated as absent credentials.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, payload) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(payload.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}

/// Whether any occurrence of the named header equals the expected value.
fn header_has_value(headers: &HeaderMap, name: &str, expected: &str) -> bool {
    let Ok(name) = http::HeaderName::try_from(name) else {
        return false;
    };
    headers
        .get_all(&name)
        .iter()
        .any(|value| value.as_bytes() == expected.as_bytes())
}
