mod collect;
mod logging;
mod output;

use std::path::{Path, PathBuf};

use breakthrough_core::RunOutcome;
use breakthrough_scraper::cancel_pair;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "breakthrough")]
#[command(about = "Scrape cannabis marketplace listings into validated JSON")]
struct Cli {
    /// Location to scrape; repeat to scrape several
    #[arg(long = "location", default_value = "california")]
    locations: Vec<String>,

    /// Product type to scrape; repeat to scrape several
    #[arg(long = "product-type", default_value = "flower")]
    product_types: Vec<String>,

    /// Maximum pages to fetch per location and product type
    #[arg(long, default_value_t = 5)]
    max_pages: u32,

    /// Output directory (overrides `output.directory` from the config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Path to the JSON config file
    #[arg(long, default_value = breakthrough_core::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Scrape runs allowed in flight at once
    #[arg(long, default_value_t = 2)]
    concurrency: usize,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let (log_filter, log_path) =
        logging::init(cli.verbose, Path::new(logging::LOG_DIR), chrono::Utc::now())?;
    tracing::info!(log_file = %log_path.display(), "starting breakthrough scraper");

    let mut config = breakthrough_core::load_app_config(&cli.config)?;
    logging::apply_config_level(&log_filter, cli.verbose, &config.log_level)?;
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.display().to_string();
    }

    let requests = collect::build_requests(&cli.locations, &cli.product_types, cli.max_pages)?;
    tracing::info!(
        runs = requests.len(),
        max_pages = cli.max_pages,
        concurrency = cli.concurrency,
        "starting scrape"
    );

    let (cancel, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received ctrl-c; keeping pages fetched so far");
            cancel.cancel();
        }
    });

    let results = collect::run_all(&config, requests, signal, cli.concurrency).await?;
    let finished_at = chrono::Utc::now();
    let path = output::write_results(&config.output, &results, finished_at)?;
    tracing::info!(path = %path.display(), "results written");
    println!("{}", output::render_summary(&results, &path, finished_at));

    if results
        .iter()
        .all(|r| r.summary.outcome == RunOutcome::Failed)
    {
        anyhow::bail!("every scrape run failed; see the summary above");
    }
    Ok(())
}
