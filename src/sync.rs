use std::collections::HashSet;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Map, Value};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn};

use crate::airtable::{self, LeadStore, UpdateOutcome};
use crate::instagram::{normalize_handle, profile_link, ProfileSource};
use crate::model::{LeadStatus, ProfileSnapshot, Sort};
use crate::pacer::Pacer;

pub struct SyncOptions {
    /// Order requested from the table; `None` keeps the table's own order.
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
    /// Log planned patches instead of sending them.
    pub dry_run: bool,
    pub show_progress: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub fetched: usize,
    pub processed: usize,
    pub refreshed: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed_updates: usize,
    pub truncated: bool,
}

impl SyncStats {
    pub fn print(&self) {
        println!(
            "Fetched {} leads, processed {} ({} refreshed, {} deleted, {} skipped, {} failed updates).",
            self.fetched, self.processed, self.refreshed, self.deleted, self.skipped, self.failed_updates,
        );
        if self.truncated {
            println!("Warning: the lead list was cut short by a pagination error.");
        }
    }
}

/// The patch a lead receives after its profile lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadUpdate {
    Deleted,
    Refreshed {
        handle: String,
        snapshot: ProfileSnapshot,
    },
}

impl LeadUpdate {
    pub fn plan(handle: &str, profile: Option<ProfileSnapshot>) -> Self {
        match profile {
            None => LeadUpdate::Deleted,
            Some(snapshot) => LeadUpdate::Refreshed {
                handle: handle.to_string(),
                snapshot,
            },
        }
    }

    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        match self {
            LeadUpdate::Deleted => {
                fields.insert("status".into(), json!(LeadStatus::IgDeleted));
            }
            LeadUpdate::Refreshed { handle, snapshot } => {
                fields.insert("instagram_handle".into(), json!(handle));
                fields.insert("instagram_link".into(), json!(profile_link(handle)));
                fields.insert("followers".into(), json!(snapshot.followers));
                fields.insert("following".into(), json!(snapshot.following));
            }
        }
        fields
    }
}

/// One full pass: fetch every lead, look up its profile and patch the record.
///
/// Update failures are logged and counted. A failed profile lookup (anything
/// other than found / not found) aborts the pass.
pub fn update_leads<S, P>(
    store: &S,
    profiles: &P,
    pacer: &Pacer,
    options: &SyncOptions,
) -> Result<SyncStats>
where
    S: LeadStore + ?Sized,
    P: ProfileSource + ?Sized,
{
    debug!("Retrieving leads");
    let fetched = airtable::fetch_all_leads(store, options.sort.as_ref());
    let mut stats = SyncStats {
        fetched: fetched.records.len(),
        truncated: fetched.truncated,
        ..Default::default()
    };

    let mut leads = fetched.records;
    if let Some(limit) = options.limit {
        leads.truncate(limit);
    }
    info!("Updating {} leads", leads.len());

    let pb = if progress_visible(options.show_progress, LevelFilter::current()) {
        ProgressBar::new(leads.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut lookups = 0usize;
    let mut seen: HashSet<&str> = HashSet::new();
    for lead in &leads {
        pb.inc(1);
        let name = lead.display_name();
        if !seen.insert(lead.id.as_str()) {
            pb.suspend(|| warn!("Lead {} ({}) already processed this run, skipping", name, lead.id));
            stats.skipped += 1;
            continue;
        }
        let Some(handle) = lead
            .fields
            .instagram_handle
            .as_deref()
            .map(normalize_handle)
            .filter(|h| !h.is_empty())
        else {
            pb.suspend(|| warn!("Lead {} ({}) has no instagram handle, skipping", name, lead.id));
            stats.skipped += 1;
            continue;
        };

        if lookups > 0 {
            pacer.pause();
        }
        lookups += 1;

        let status = lead
            .fields
            .status
            .as_ref()
            .map(LeadStatus::as_str)
            .unwrap_or("-");
        pb.suspend(|| info!("Updating lead {} (status: {})", name, status));
        debug!(
            "Lead {} created {:?}, last updated {:?}",
            lead.id, lead.created_time, lead.fields.updated_at
        );

        let profile = profiles
            .scrape_profile(handle)
            .with_context(|| format!("Failed to scrape profile {} for lead {}", handle, lead.id))?;
        let update = LeadUpdate::plan(handle, profile);
        match &update {
            LeadUpdate::Deleted => {
                pb.suspend(|| warn!("User {} not found, updating status to IG_DELETED", handle));
                stats.deleted += 1;
            }
            LeadUpdate::Refreshed { snapshot, .. } => {
                debug!(
                    "{}: {} followers, {} following",
                    handle, snapshot.followers, snapshot.following
                );
                stats.refreshed += 1;
            }
        }
        stats.processed += 1;

        let fields = update.fields();
        if options.dry_run {
            let planned = serde_json::Value::Object(fields);
            pb.suspend(|| info!("[dry-run] would update {} with {}", lead.id, planned));
            continue;
        }
        if pb.suspend(|| airtable::update_record(store, &lead.id, &fields)) == UpdateOutcome::Failed {
            stats.failed_updates += 1;
        }
    }

    pb.finish_and_clear();
    info!(
        "Processed {} leads ({} refreshed, {} deleted, {} skipped)",
        stats.processed, stats.refreshed, stats.deleted, stats.skipped
    );
    Ok(stats)
}

/// The bar shares the terminal with log lines; at debug level there are too
/// many of them to keep it readable.
fn progress_visible(requested: bool, max_level: LevelFilter) -> bool {
    requested && max_level < LevelFilter::DEBUG
}
