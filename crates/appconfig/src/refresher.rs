use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gatehouse_core::{RuleFragment, SnapshotHandle};

use crate::client::{AgentClient, ProfileName};
use crate::error::AppConfigError;

/// Keeps the published snapshot current against the config agent.
///
/// The initial refresh runs synchronously before the proxy starts serving
/// and is fatal when no profile at all can be fetched. Afterwards a spawned
/// task re-fetches every profile on a fixed interval; a cycle publishes only
/// when the complete profile set was obtained, otherwise the prior snapshot
/// stays authoritative.
#[derive(Debug)]
pub struct Refresher {
    client: AgentClient,
    profiles: Vec<ProfileName>,
    snapshots: Arc<SnapshotHandle>,
    interval: Duration,
}

impl Refresher {
    pub fn new(
        client: AgentClient,
        profiles: Vec<ProfileName>,
        snapshots: Arc<SnapshotHandle>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            profiles,
            snapshots,
            interval,
        }
    }

    /// Fetch every profile once and publish the first snapshot.
    ///
    /// Failed profiles are skipped with a warning: with no prior snapshot to
    /// retain, serving the successfully fetched rules beats serving nothing.
    /// When every profile fails the process cannot safely serve and this
    /// returns [`AppConfigError::NoUsableProfiles`].
    pub async fn initial_refresh(&self) -> Result<u64, AppConfigError> {
        let (fragments, failed) = self.fetch_all().await;
        if fragments.is_empty() {
            return Err(AppConfigError::NoUsableProfiles);
        }
        if failed > 0 {
            warn!(
                failed,
                fetched = fragments.len(),
                "starting with a partial rule set; failed profiles retry on the next cycle"
            );
        }

        let version = self.snapshots.publish(&fragments);
        info!(
            version,
            profiles = fragments.len(),
            "published initial rule snapshot"
        );
        Ok(version)
    }

    /// One periodic refresh cycle.
    ///
    /// Publishes a new snapshot only when every configured profile was
    /// fetched; any failure retains the prior snapshot for this cycle.
    pub async fn refresh_once(&self) {
        let (fragments, failed) = self.fetch_all().await;
        if failed > 0 {
            warn!(
                failed,
                retained_version = self.snapshots.version(),
                "refresh cycle incomplete, retaining previous snapshot"
            );
            return;
        }

        let version = self.snapshots.publish(&fragments);
        debug!(version, profiles = fragments.len(), "published rule snapshot");
    }

    /// Run the periodic refresh loop as a background task.
    ///
    /// The first tick fires immediately and is skipped because the caller
    /// has already performed the initial refresh.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.tick().await;
            loop {
                timer.tick().await;
                self.refresh_once().await;
            }
        })
    }

    /// Fetch all profiles, returning the successful fragments and the
    /// number of failures. Failures are logged here with their profile name.
    async fn fetch_all(&self) -> (Vec<RuleFragment>, usize) {
        let mut fragments = Vec::with_capacity(self.profiles.len());
        let mut failed = 0;

        for profile in &self.profiles {
            match self.client.fetch(profile).await {
                Ok(fragment) => {
                    debug!(profile = %profile, "fetched profile");
                    fragments.push(fragment);
                }
                Err(error) => {
                    warn!(profile = %profile, %error, "profile fetch failed");
                    failed += 1;
                }
            }
        }

        (fragments, failed)
    }
}
