mod airtable;
mod error;
mod instagram;
mod model;
mod pacer;
mod settings;
mod sync;
#[cfg(test)]
mod test_http;

use std::time::Instant;

use clap::Parser;
use tracing::info;

use airtable::AirtableClient;
use instagram::InstagramClient;
use model::Sort;
use pacer::Pacer;
use settings::Settings;
use sync::SyncOptions;

#[derive(Parser)]
#[command(
    name = "lead_sync",
    about = "Refresh Airtable leads with follower counts from Instagram"
)]
struct Cli {
    /// Max leads to process (default: all)
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Log the planned updates without writing them to Airtable
    #[arg(long)]
    dry_run: bool,
    /// Skip the randomized pause between profile lookups
    #[arg(long)]
    no_delay: bool,
    /// Keep the table's own order instead of stalest-first
    #[arg(long)]
    no_sort: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    info!("Starting lead sync with {:?}", settings);

    let store = AirtableClient::new(&settings)?;
    let profiles = InstagramClient::new(&settings)?;
    let pacer = if cli.no_delay {
        Pacer::disabled()
    } else {
        settings.pacer()
    };
    let options = SyncOptions {
        sort: (!cli.no_sort).then(|| Sort::new(settings.sort_field.as_str(), settings.sort_direction)),
        limit: cli.limit,
        dry_run: cli.dry_run,
        show_progress: true,
    };

    let stats = sync::update_leads(&store, &profiles, &pacer, &options)?;
    stats.print();

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
