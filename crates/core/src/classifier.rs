use tracing::warn;

/// Whether the authorisation engine applies to a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The request must pass authorisation before being forwarded.
    Apply,
    /// The request is forwarded without consulting the rule set.
    Bypass,
}

#[derive(Debug, Clone)]
enum Mode {
    /// Filtering disabled: everything bypasses.
    Disabled,
    /// No path lists configured: everything is filtered.
    All,
    /// Listed prefixes bypass, everything else is filtered.
    PublicPrefixes(Vec<String>),
    /// Listed prefixes are filtered, everything else bypasses.
    ProtectedPrefixes(Vec<String>),
}

/// Decides per request path whether authorisation applies.
///
/// Built once at start-up from `IPFILTER_ENABLED`, `PUBLIC_PATHS`, and
/// `PROTECTED_PATHS`. When both lists are configured, `PROTECTED_PATHS` is
/// ignored with a warning; public prefixes take precedence. Prefix matching
/// is byte-exact against the raw request path, with no percent-decoding.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    mode: Mode,
}

impl PathClassifier {
    /// Build a classifier from the effective configuration.
    pub fn new(enabled: bool, public_paths: Vec<String>, protected_paths: Vec<String>) -> Self {
        if !enabled {
            return Self {
                mode: Mode::Disabled,
            };
        }

        if !public_paths.is_empty() && !protected_paths.is_empty() {
            warn!(
                "both PUBLIC_PATHS and PROTECTED_PATHS are configured; ignoring PROTECTED_PATHS"
            );
        }

        let mode = if !public_paths.is_empty() {
            Mode::PublicPrefixes(public_paths)
        } else if !protected_paths.is_empty() {
            Mode::ProtectedPrefixes(protected_paths)
        } else {
            Mode::All
        };

        Self { mode }
    }

    /// Classify a raw request path.
    pub fn classify(&self, path: &str) -> Classification {
        match &self.mode {
            Mode::Disabled => Classification::Bypass,
            Mode::All => Classification::Apply,
            Mode::PublicPrefixes(prefixes) => {
                if prefix_match(prefixes, path) {
                    Classification::Bypass
                } else {
                    Classification::Apply
                }
            }
            Mode::ProtectedPrefixes(prefixes) => {
                if prefix_match(prefixes, path) {
                    Classification::Apply
                } else {
                    Classification::Bypass
                }
            }
        }
    }
}

fn prefix_match(prefixes: &[String], path: &str) -> bool {
    prefixes
        .iter()
        .any(|prefix| path.as_bytes().starts_with(prefix.as_bytes()))
}
