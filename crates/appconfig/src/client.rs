use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use gatehouse_core::RuleFragment;

use crate::error::AppConfigError;
use crate::parser::parse_profile;

/// A profile identifier: `application:environment:configuration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileName {
    pub application: String,
    pub environment: String,
    pub configuration: String,
}

impl FromStr for ProfileName {
    type Err = AppConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(application), Some(environment), Some(configuration), None)
                if !application.is_empty()
                    && !environment.is_empty()
                    && !configuration.is_empty() =>
            {
                Ok(Self {
                    application: application.to_owned(),
                    environment: environment.to_owned(),
                    configuration: configuration.to_owned(),
                })
            }
            _ => Err(AppConfigError::InvalidProfileName(s.to_owned())),
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.application, self.environment, self.configuration
        )
    }
}

/// HTTP client for the local configuration agent.
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
}

impl AgentClient {
    /// Create a client against the agent base URL with a per-request timeout.
    ///
    /// The timeout applies to each profile fetch; a fetch that exceeds it
    /// counts as a failure for that profile.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AppConfigError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// The agent base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and parse one profile.
    ///
    /// Issues
    /// `GET {base}/applications/{a}/environments/{e}/configurations/{c}`.
    /// Transport failures, non-2xx answers, and unreadable YAML documents
    /// fail the fetch; malformed individual entries inside a readable
    /// document are dropped with a warning by the parser instead.
    pub async fn fetch(&self, profile: &ProfileName) -> Result<RuleFragment, AppConfigError> {
        let url = format!(
            "{}/applications/{}/environments/{}/configurations/{}",
            self.base_url, profile.application, profile.environment, profile.configuration
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| AppConfigError::Fetch {
                profile: profile.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppConfigError::Status {
                profile: profile.to_string(),
                status,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| AppConfigError::Fetch {
                profile: profile.to_string(),
                source,
            })?;

        parse_profile(&profile.to_string(), &body)
    }
}
