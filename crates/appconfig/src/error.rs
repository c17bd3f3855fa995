use thiserror::Error;

/// Errors raised while fetching or refreshing rule profiles.
#[derive(Debug, Error)]
pub enum AppConfigError {
    /// A profile name was not an `application:environment:configuration` triple.
    #[error("profile name `{0}` is not of the form application:environment:configuration")]
    InvalidProfileName(String),

    /// The agent HTTP client could not be constructed.
    #[error("failed to build agent HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request to the agent failed at the transport level (including
    /// the per-profile timeout).
    #[error("fetch for profile `{profile}` failed: {source}")]
    Fetch {
        profile: String,
        #[source]
        source: reqwest::Error,
    },

    /// The agent answered with a non-success status.
    #[error("agent returned HTTP {status} for profile `{profile}`")]
    Status {
        profile: String,
        status: reqwest::StatusCode,
    },

    /// The profile body was not a readable YAML document.
    #[error("profile `{profile}` is not valid YAML: {source}")]
    Parse {
        profile: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// The initial refresh could not fetch a single usable profile.
    #[error("initial refresh produced no usable profile")]
    NoUsableProfiles,
}
