use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::model::SortDirection;
use crate::pacer::Pacer;

/// Runtime configuration, read once from the environment.
///
/// `AIRTABLE_ACCESS_TOKEN`, `AIRTABLE_BASE_ID` and `AIRTABLE_TABLE_ID` are
/// required. Tuning knobs use the `LEAD_SYNC_` prefix, e.g.
/// `LEAD_SYNC_MAX_DELAY_SECS=30`.
#[derive(Deserialize)]
pub struct Settings {
    pub access_token: String,
    pub base_id: String,
    pub table_id: String,

    #[serde(default = "default_airtable_url")]
    pub airtable_url: String,
    #[serde(default = "default_instagram_url")]
    pub instagram_url: String,
    #[serde(default = "default_sort_field")]
    pub sort_field: String,
    #[serde(default = "default_sort_direction")]
    pub sort_direction: SortDirection,

    #[serde(default = "default_min_delay")]
    pub min_delay_secs: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_airtable_url() -> String {
    "https://api.airtable.com".to_string()
}

fn default_instagram_url() -> String {
    "https://i.instagram.com".to_string()
}

fn default_sort_field() -> String {
    "updated_at".to_string()
}

fn default_sort_direction() -> SortDirection {
    SortDirection::Asc
}

fn default_min_delay() -> u64 {
    5
}

fn default_max_delay() -> u64 {
    15
}

fn default_timeout() -> u64 {
    30
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("access_token", &"<redacted>")
            .field("base_id", &self.base_id)
            .field("table_id", &self.table_id)
            .field("airtable_url", &self.airtable_url)
            .field("instagram_url", &self.instagram_url)
            .field("sort_field", &self.sort_field)
            .field("sort_direction", &self.sort_direction)
            .field("min_delay_secs", &self.min_delay_secs)
            .field("max_delay_secs", &self.max_delay_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Build settings from `vars` instead of the process environment when given.
    pub fn load(vars: Option<config::Map<String, String>>) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(Environment::with_prefix("AIRTABLE").source(vars.clone()))
            .add_source(
                Environment::with_prefix("LEAD_SYNC")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()
            .context("Failed to read environment")?
            .try_deserialize()
            .context("AIRTABLE_ACCESS_TOKEN, AIRTABLE_BASE_ID and AIRTABLE_TABLE_ID must be set")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("AIRTABLE_ACCESS_TOKEN", &self.access_token),
            ("AIRTABLE_BASE_ID", &self.base_id),
            ("AIRTABLE_TABLE_ID", &self.table_id),
        ] {
            if value.trim().is_empty() {
                bail!("{} is set but empty", name);
            }
        }
        if self.min_delay_secs > self.max_delay_secs {
            bail!(
                "LEAD_SYNC_MIN_DELAY_SECS ({}) exceeds LEAD_SYNC_MAX_DELAY_SECS ({})",
                self.min_delay_secs,
                self.max_delay_secs
            );
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pacer(&self) -> Pacer {
        Pacer::jitter(
            Duration::from_secs(self.min_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}
