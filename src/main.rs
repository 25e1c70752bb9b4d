use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use console_finder::config::Settings;
use console_finder::models::Site;
use console_finder::pipeline::SiteRunner;
use console_finder::sites::scraper_for;

#[derive(Parser)]
#[command(name = "console-finder")]
#[command(about = "Aggregates video game console listings from Colombian marketplaces")]
#[command(version)]
struct Cli {
    /// Log page previews and item state transitions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured sites once and exit
    Scrape {
        /// Site to scrape (mercadolibre, olx, alkosto, exito) or "all"
        #[arg(short, long, default_value = "all")]
        site: String,

        /// Forward assembled batches to the store API after exporting
        #[arg(long)]
        forward: bool,

        /// Directory the JSON shards are written into
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Visit at most this many listing pages per site
        #[arg(long)]
        pages: Option<usize>,

        /// Keep at most this many records per site run
        #[arg(long)]
        limit: Option<usize>,

        /// Skip the local sqlite catalog entirely
        #[arg(long)]
        no_catalog: bool,
    },

    /// Keep scraping on a cron schedule until interrupted
    Watch {
        /// Cron expression with a leading seconds field
        #[arg(long, default_value = "0 0 */6 * * *")]
        schedule: String,

        /// Site to scrape (mercadolibre, olx, alkosto, exito) or "all"
        #[arg(short, long, default_value = "all")]
        site: String,

        /// Forward assembled batches to the store API after exporting
        #[arg(long)]
        forward: bool,
    },

    /// List the sites this build knows how to scrape
    Sites,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scrape {
            site,
            forward,
            out,
            pages,
            limit,
            no_catalog,
        } => {
            let sites = select_sites(&site)?;
            let mut settings = Settings::from_env();
            settings.verbose = cli.verbose;
            settings.forward = forward;
            settings.max_pages = pages;
            settings.max_items = limit;
            settings.catalog_enabled = !no_catalog;
            if let Some(dir) = out {
                settings.export_dir = dir;
            }

            let runner = SiteRunner::new(settings).await?;
            scrape_all(&runner, &sites).await;
        }
        Commands::Watch {
            schedule,
            site,
            forward,
        } => {
            let sites = select_sites(&site)?;
            let mut settings = Settings::from_env();
            settings.verbose = cli.verbose;
            settings.forward = forward;

            let runner = SiteRunner::new(settings).await?;
            watch(runner, sites, &schedule).await?;
        }
        Commands::Sites => {
            for site in Site::all() {
                let config = *scraper_for(site).config();
                println!(
                    "{:<14} {:<24} {:?} pagination over {:?} transport",
                    site.token(),
                    site.label(),
                    config.strategy,
                    config.transport
                );
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "console_finder=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn select_sites(token: &str) -> Result<Vec<Site>> {
    if token.eq_ignore_ascii_case("all") {
        return Ok(Site::all().to_vec());
    }
    Site::parse(token).map(|site| vec![site]).ok_or_else(|| {
        let known = Site::all().map(|s| s.token()).join(", ");
        anyhow!("unknown site `{token}`, expected one of: {known}, all")
    })
}

async fn scrape_all(runner: &SiteRunner, sites: &[Site]) {
    for site in sites {
        match runner.run(*site).await {
            Ok(summary) => {
                let new_note = summary
                    .new_items
                    .map(|n| format!(", {n} new"))
                    .unwrap_or_default();
                info!(
                    "{}: {} records across {} shards, {} dropped{}{}",
                    site,
                    summary.scraped,
                    summary.shards.len(),
                    summary.dropped,
                    new_note,
                    if summary.forwarded {
                        ", forwarded to store"
                    } else {
                        ""
                    }
                );
            }
            Err(e) => error!("{} run failed: {}", site, e),
        }
    }
}

async fn watch(runner: SiteRunner, sites: Vec<Site>, schedule: &str) -> Result<()> {
    // Run once right away so a fresh deployment has data before the
    // first scheduled tick.
    scrape_all(&runner, &sites).await;

    let scheduler = JobScheduler::new().await?;
    let job_runner = runner.clone();
    let job_sites = Arc::new(sites);
    scheduler
        .add(Job::new_async(schedule, move |_uuid, _l| {
            let runner = job_runner.clone();
            let sites = Arc::clone(&job_sites);
            Box::pin(async move {
                scrape_all(&runner, &sites).await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    info!("Watching on schedule `{}`", schedule);

    // Keep the program running for the scheduler.
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
    }
}
