use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    pub prefetch: PrefetchConfig,
    pub demo: DemoConfig,
}

/// Staleness windows for prefetched board snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// A prefetch re-fetches a board once its cached copy is older than this.
    pub refresh_after_secs: u64,
    /// A cached copy older than this is never served to a load.
    pub valid_for_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    pub board_id: String,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            refresh_after_secs: 60,
            valid_for_secs: 300,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            board_id: "demo-board".to_string(),
        }
    }
}

impl PrefetchConfig {
    pub fn refresh_after(&self) -> Duration {
        Duration::from_secs(self.refresh_after_secs)
    }

    pub fn valid_for(&self) -> Duration {
        Duration::from_secs(self.valid_for_secs)
    }
}

impl SyncConfig {
    /// Load configuration from defaults, an optional `workflow` config file
    /// and `WORKFLOW_` environment variables, in that order.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&SyncConfig::default())?);

        config = config.add_source(config::File::with_name("workflow").required(false));

        // e.g. WORKFLOW_PREFETCH__VALID_FOR_SECS=120
        config = config.add_source(
            config::Environment::with_prefix("WORKFLOW")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let sync_config: SyncConfig = config.try_deserialize()?;

        Ok(sync_config)
    }
}
