use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use gatehouse_appconfig::ProfileName;

/// A start-up configuration problem. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingRequired(String),

    #[error("environment variable {name} has invalid value `{value}`: {message}")]
    Invalid {
        name: String,
        value: String,
        message: String,
    },
}

/// Immutable snapshot of the process environment with per-environment
/// overlay resolution.
///
/// A variable `NAME` may be shadowed by `<ENV>_NAME`, where `<ENV>` is the
/// upper-cased value of `COPILOT_ENVIRONMENT_NAME`. A shadow that is set to
/// the empty string counts as explicitly unset: typed accessors fall back
/// to their defaults rather than to the unprefixed variable.
#[derive(Debug, Clone)]
pub struct Environ {
    vars: HashMap<String, String>,
    environment: String,
}

impl Environ {
    /// Capture the process environment. Fails when
    /// `COPILOT_ENVIRONMENT_NAME` is absent.
    pub fn from_process() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map (used by tests).
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let environment = vars
            .get("COPILOT_ENVIRONMENT_NAME")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| ConfigError::MissingRequired("COPILOT_ENVIRONMENT_NAME".to_owned()))?;
        Ok(Self { vars, environment })
    }

    /// The environment name driving the overlay.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Overlay lookup: `<ENV>_<NAME>` when present (even empty), else
    /// `<NAME>`, else absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        let prefixed = format!("{}_{name}", self.environment.to_uppercase());
        self.vars
            .get(&prefixed)
            .or_else(|| self.vars.get(name))
            .map(String::as_str)
    }

    /// String value with a default; an empty value counts as unset.
    pub fn get_or(&self, name: &str, default: &str) -> String {
        match self.get(name).filter(|v| !v.is_empty()) {
            Some(value) => value.to_owned(),
            None => default.to_owned(),
        }
    }

    /// Boolean coercion: `True`, `true`, and `1` are true, any other set
    /// value is false; an unset or explicitly empty variable takes the
    /// default.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get(name).filter(|v| !v.is_empty()) {
            None => default,
            Some(value) => matches!(value, "True" | "true" | "1"),
        }
    }

    /// Parse a set, non-empty value; malformed values are a [`ConfigError`].
    pub fn get_parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
                name: name.to_owned(),
                value: raw.to_owned(),
                message: e.to_string(),
            }),
        }
    }

    /// Comma-separated list; an empty or unset value is the empty list.
    pub fn get_list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A required, non-empty value.
    pub fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| ConfigError::MissingRequired(name.to_owned()))
    }
}

/// All settings, resolved once at start-up. Later changes to the process
/// environment have no effect.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    /// Environment name (`COPILOT_ENVIRONMENT_NAME`).
    pub environment: String,
    /// Origin authority requests are forwarded to (`SERVER`).
    pub origin_host: String,
    /// Scheme for origin requests (`SERVER_PROTO`).
    pub origin_proto: String,
    /// Listen port (`PORT`).
    pub port: u16,
    /// Log filter default (`LOG_LEVEL`); `RUST_LOG` still wins when set.
    pub log_level: String,
    /// Config agent base URL (`APPCONFIG_URL`).
    pub agent_url: String,
    /// Profiles to fetch and merge (`APPCONFIG_PROFILES`).
    pub profiles: Vec<ProfileName>,
    /// X-Forwarded-For selection index
    /// (`IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX`).
    pub xff_index: i64,
    /// Denial page contact address (`EMAIL`).
    pub contact_email: String,
    /// Denial page contact label (`EMAIL_NAME`).
    pub contact_email_label: String,
    /// Master switch for the authorisation filter (`IPFILTER_ENABLED`).
    pub filter_enabled: bool,
    /// Path prefixes exempt from authorisation (`PUBLIC_PATHS`).
    pub public_paths: Vec<String>,
    /// Path prefixes subject to authorisation (`PROTECTED_PATHS`).
    pub protected_paths: Vec<String>,
    /// Period of the rule refresh task (`APPCONFIG_REFRESH_INTERVAL`).
    pub refresh_interval: Duration,
    /// Per-profile fetch timeout (`APPCONFIG_FETCH_TIMEOUT`).
    pub fetch_timeout: Duration,
    /// Origin TCP connect timeout (`ORIGIN_CONNECT_TIMEOUT`).
    pub origin_connect_timeout: Duration,
    /// Origin response timeout (`ORIGIN_READ_TIMEOUT`).
    pub origin_read_timeout: Duration,
}

impl EffectiveConfig {
    /// Resolve every setting against the captured environment.
    pub fn load(env: &Environ) -> Result<Self, ConfigError> {
        let origin_host = env.require("SERVER")?;

        let origin_proto = env.get_or("SERVER_PROTO", "http");
        if origin_proto != "http" && origin_proto != "https" {
            return Err(ConfigError::Invalid {
                name: "SERVER_PROTO".to_owned(),
                value: origin_proto,
                message: "expected `http` or `https`".to_owned(),
            });
        }

        let agent_url = env
            .get_or("APPCONFIG_URL", "http://localhost:2772")
            .trim_end_matches('/')
            .to_owned();
        if !agent_url.starts_with("http://") && !agent_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "APPCONFIG_URL".to_owned(),
                value: agent_url,
                message: "expected an http(s) URL".to_owned(),
            });
        }

        env.require("APPCONFIG_PROFILES")?;
        let profiles = env
            .get_list("APPCONFIG_PROFILES")
            .iter()
            .map(|raw| {
                raw.parse::<ProfileName>().map_err(|e| ConfigError::Invalid {
                    name: "APPCONFIG_PROFILES".to_owned(),
                    value: raw.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if profiles.is_empty() {
            return Err(ConfigError::MissingRequired("APPCONFIG_PROFILES".to_owned()));
        }

        Ok(Self {
            environment: env.environment().to_owned(),
            origin_host,
            origin_proto,
            port: env.get_parsed("PORT")?.unwrap_or(8080),
            log_level: env.get_or("LOG_LEVEL", "INFO"),
            agent_url,
            profiles,
            xff_index: env
                .get_parsed("IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX")?
                .unwrap_or(-2),
            contact_email: env.get_or("EMAIL", ""),
            contact_email_label: env.get_or("EMAIL_NAME", ""),
            filter_enabled: env.get_bool("IPFILTER_ENABLED", true),
            public_paths: env.get_list("PUBLIC_PATHS"),
            protected_paths: env.get_list("PROTECTED_PATHS"),
            refresh_interval: Duration::from_secs(
                env.get_parsed("APPCONFIG_REFRESH_INTERVAL")?.unwrap_or(30),
            ),
            fetch_timeout: Duration::from_secs(
                env.get_parsed("APPCONFIG_FETCH_TIMEOUT")?.unwrap_or(5),
            ),
            origin_connect_timeout: Duration::from_secs(
                env.get_parsed("ORIGIN_CONNECT_TIMEOUT")?.unwrap_or(5),
            ),
            origin_read_timeout: Duration::from_secs(
                env.get_parsed("ORIGIN_READ_TIMEOUT")?.unwrap_or(30),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environ(pairs: &[(&str, &str)]) -> Environ {
        let mut vars: HashMap<String, String> =
            [("COPILOT_ENVIRONMENT_NAME".to_owned(), "live".to_owned())].into();
        for (k, v) in pairs {
            vars.insert((*k).to_owned(), (*v).to_owned());
        }
        Environ::from_vars(vars).unwrap()
    }

    fn minimal(pairs: &[(&str, &str)]) -> Environ {
        let mut all = vec![
            ("SERVER", "origin.internal:8000"),
            ("APPCONFIG_PROFILES", "app:live:rules"),
        ];
        all.extend_from_slice(pairs);
        environ(&all)
    }

    // -- Overlay resolution -------------------------------------------------

    #[test]
    fn prefixed_variable_shadows_global() {
        let env = environ(&[("PORT", "8080"), ("LIVE_PORT", "9000")]);
        assert_eq!(env.get("PORT"), Some("9000"));
    }

    #[test]
    fn environment_name_is_uppercased_for_the_prefix() {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("COPILOT_ENVIRONMENT_NAME".to_owned(), "staging".to_owned());
        vars.insert("STAGING_EMAIL".to_owned(), "s@example.com".to_owned());
        let env = Environ::from_vars(vars).unwrap();
        assert_eq!(env.get("EMAIL"), Some("s@example.com"));
    }

    #[test]
    fn empty_prefixed_variable_is_explicit_unset() {
        let env = environ(&[("EMAIL", "global@example.com"), ("LIVE_EMAIL", "")]);
        // The shadow wins the lookup even when empty...
        assert_eq!(env.get("EMAIL"), Some(""));
        // ...and the typed accessor treats it as unset, not as the global.
        assert_eq!(env.get_or("EMAIL", "fallback"), "fallback");
    }

    #[test]
    fn missing_environment_name_is_fatal() {
        let err = Environ::from_vars(HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(name) if name == "COPILOT_ENVIRONMENT_NAME"));
    }

    // -- Typed accessors ----------------------------------------------------

    #[test]
    fn bool_coercion_accepts_three_spellings() {
        for value in ["True", "true", "1"] {
            let env = environ(&[("IPFILTER_ENABLED", value)]);
            assert!(env.get_bool("IPFILTER_ENABLED", false), "{value}");
        }
        for value in ["false", "False", "0", "yes"] {
            let env = environ(&[("IPFILTER_ENABLED", value)]);
            assert!(!env.get_bool("IPFILTER_ENABLED", true), "{value:?}");
        }
        assert!(environ(&[]).get_bool("IPFILTER_ENABLED", true));
        // Empty means explicit unset, not false.
        assert!(environ(&[("IPFILTER_ENABLED", "")]).get_bool("IPFILTER_ENABLED", true));
    }

    #[test]
    fn empty_boolean_override_falls_back_to_the_default() {
        let env = environ(&[("IPFILTER_ENABLED", "true"), ("LIVE_IPFILTER_ENABLED", "")]);
        // The empty shadow resets the environment to the default rather
        // than reading as false and disabling the filter.
        assert!(env.get_bool("IPFILTER_ENABLED", true));
        let config = EffectiveConfig::load(&minimal(&[
            ("IPFILTER_ENABLED", "true"),
            ("LIVE_IPFILTER_ENABLED", ""),
        ]))
        .unwrap();
        assert!(config.filter_enabled);
    }

    #[test]
    fn list_coercion_splits_on_commas() {
        let env = environ(&[("PUBLIC_PATHS", "/healthcheck, /static")]);
        assert_eq!(env.get_list("PUBLIC_PATHS"), vec!["/healthcheck", "/static"]);
        assert!(environ(&[("PUBLIC_PATHS", "")]).get_list("PUBLIC_PATHS").is_empty());
        assert!(environ(&[]).get_list("PUBLIC_PATHS").is_empty());
    }

    #[test]
    fn malformed_integer_is_a_config_error() {
        let env = environ(&[("PORT", "eighty")]);
        assert!(env.get_parsed::<u16>("PORT").is_err());
    }

    // -- EffectiveConfig ----------------------------------------------------

    #[test]
    fn defaults_apply_when_optionals_are_absent() {
        let config = EffectiveConfig::load(&minimal(&[])).unwrap();
        assert_eq!(config.origin_proto, "http");
        assert_eq!(config.port, 8080);
        assert_eq!(config.agent_url, "http://localhost:2772");
        assert_eq!(config.xff_index, -2);
        assert!(config.filter_enabled);
        assert!(config.public_paths.is_empty());
        assert!(config.protected_paths.is_empty());
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.origin_read_timeout, Duration::from_secs(30));
    }

    #[test]
    fn required_server_is_enforced() {
        let env = environ(&[("APPCONFIG_PROFILES", "a:b:c")]);
        let err = EffectiveConfig::load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(name) if name == "SERVER"));
    }

    #[test]
    fn profiles_parse_into_triples() {
        let env = minimal(&[(
            "APPCONFIG_PROFILES",
            "app:live:ipranges,app:live:tokens",
        )]);
        let config = EffectiveConfig::load(&env).unwrap();
        assert_eq!(config.profiles.len(), 2);
        assert_eq!(config.profiles[1].configuration, "tokens");
    }

    #[test]
    fn malformed_profile_name_is_fatal() {
        let env = minimal(&[("APPCONFIG_PROFILES", "not-a-triple")]);
        assert!(EffectiveConfig::load(&env).is_err());
    }

    #[test]
    fn unknown_server_proto_is_fatal() {
        let env = minimal(&[("SERVER_PROTO", "ftp")]);
        assert!(EffectiveConfig::load(&env).is_err());
    }

    #[test]
    fn per_environment_override_reaches_effective_config() {
        let env = minimal(&[
            ("IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX", "-2"),
            ("LIVE_IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX", "-3"),
        ]);
        let config = EffectiveConfig::load(&env).unwrap();
        assert_eq!(config.xff_index, -3);
    }
}
