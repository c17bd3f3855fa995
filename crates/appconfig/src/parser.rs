use serde::Deserialize;
use tracing::warn;

use gatehouse_core::{BasicAuthEntry, RuleFragment, SharedTokenEntry};

use crate::error::AppConfigError;

/// Top-level shape of a profile document.
///
/// Every key may be absent (contributing nothing); unknown keys are
/// ignored. Entries are held as raw YAML values so that one malformed entry
/// can be dropped without failing the document.
#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    #[serde(rename = "IpRanges", default)]
    ip_ranges: Vec<serde_yaml_ng::Value>,
    #[serde(rename = "BasicAuth", default)]
    basic_auth: Vec<serde_yaml_ng::Value>,
    #[serde(rename = "SharedToken", default)]
    shared_tokens: Vec<serde_yaml_ng::Value>,
}

#[derive(Debug, Deserialize)]
struct RawBasicAuth {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Password")]
    password: String,
}

#[derive(Debug, Deserialize)]
struct RawSharedToken {
    #[serde(rename = "HeaderName")]
    header_name: String,
    #[serde(rename = "Value")]
    value: String,
}

/// Parse one profile body into a rule fragment.
///
/// An unreadable document is an error; a malformed individual entry is
/// dropped with a warning naming the profile and entry index.
pub fn parse_profile(profile: &str, body: &str) -> Result<RuleFragment, AppConfigError> {
    let document: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(body).map_err(|source| AppConfigError::Parse {
            profile: profile.to_owned(),
            source,
        })?;

    // An empty body parses as null and contributes nothing.
    if document.is_null() {
        return Ok(RuleFragment::default());
    }

    let raw: RawProfile =
        serde_yaml_ng::from_value(document).map_err(|source| AppConfigError::Parse {
            profile: profile.to_owned(),
            source,
        })?;

    let mut fragment = RuleFragment::default();

    for (index, value) in raw.ip_ranges.into_iter().enumerate() {
        let parsed = serde_yaml_ng::from_value::<String>(value)
            .ok()
            .and_then(|s| s.parse().ok());
        match parsed {
            Some(range) => fragment.ip_ranges.push(range),
            None => warn!(profile, index, "dropping malformed IpRanges entry"),
        }
    }

    for (index, value) in raw.basic_auth.into_iter().enumerate() {
        match serde_yaml_ng::from_value::<RawBasicAuth>(value) {
            Ok(entry) => fragment.basic_auth.push(BasicAuthEntry {
                path_prefix: entry.path,
                username: entry.username,
                password: entry.password,
            }),
            Err(error) => {
                warn!(profile, index, %error, "dropping malformed BasicAuth entry");
            }
        }
    }

    for (index, value) in raw.shared_tokens.into_iter().enumerate() {
        match serde_yaml_ng::from_value::<RawSharedToken>(value) {
            Ok(entry) => fragment.shared_tokens.push(SharedTokenEntry {
                header_name: entry.header_name,
                value: entry.value,
            }),
            Err(error) => {
                warn!(profile, index, %error, "dropping malformed SharedToken entry");
            }
        }
    }

    Ok(fragment)
}
