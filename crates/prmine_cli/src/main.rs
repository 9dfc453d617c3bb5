//! Prmine CLI - harvest issue/PR pairs from GitHub into a CSV.

mod progress;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use console::Term;
use prmine::{run_harvest, HarvestOptions, ReqwestTransport};
use tracing_subscriber::EnvFilter;

use crate::progress::ProgressReporter;

#[derive(Parser)]
#[command(name = "prmine")]
#[command(version)]
#[command(about = "Harvest closed issues paired with the merged PR that resolved them")]
#[command(
    long_about = "Prmine searches GitHub for popular Python repositories, screens their \
merged pull requests with size and content heuristics, resolves which issue each PR \
closed, and appends the pairs to a resumable CSV. Interrupted runs can be restarted \
against the same output file."
)]
#[command(after_long_help = r#"EXAMPLES
    Harvest with the defaults into harvest.csv:
        $ prmine

    Target a single repository:
        $ prmine --repo falconry/falcon --out falcon.csv

    Larger, longer run with more workers:
        $ prmine --max-repos 5000 --max-rows 2000 --workers 4

ENVIRONMENT VARIABLES
    GITHUB_TOKEN    Personal access token. Unauthenticated requests are
                    limited to 60 per hour; a token raises that to 5000.
                    Also read from a .env file in the current directory.
"#)]
struct Cli {
    /// Output CSV path
    #[arg(short, long, default_value = "harvest.csv")]
    out: PathBuf,

    /// Restrict the search to a single owner/name repository
    #[arg(long, value_name = "OWNER/NAME")]
    repo: Option<String>,

    /// Minimum stargazer count for candidate repositories
    #[arg(long, default_value_t = 50)]
    min_stars: u64,

    /// Skip repositories larger than this many MB
    #[arg(long, default_value_t = 199.9)]
    max_repo_mb: f64,

    /// Minimum changed files per PR
    #[arg(long, default_value_t = 5)]
    min_files: u64,

    /// Maximum changed files per PR
    #[arg(long, default_value_t = 999_999)]
    max_files: u64,

    /// Minimum changed lines (additions + deletions) per PR
    #[arg(long, default_value_t = 200)]
    min_lines: u64,

    /// Maximum changed lines per PR
    #[arg(long, default_value_t = 999_999)]
    max_lines: u64,

    /// Stop after scanning this many repositories
    #[arg(long, default_value_t = 1000)]
    max_repos: usize,

    /// Stop submitting repositories once this many rows are collected
    #[arg(long, default_value_t = 500)]
    max_rows: usize,

    /// Flush rows to the CSV every N collected rows
    #[arg(long, default_value_t = 20)]
    autosave_every: usize,

    /// Measure repository size by cloning instead of trusting the API
    #[arg(long)]
    verify_clone_size: bool,

    /// Concurrent repository workers
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Disable the on-disk response cache
    #[arg(long)]
    no_cache: bool,

    /// Response cache directory
    #[arg(long, default_value = ".cache")]
    cache_dir: PathBuf,

    /// Response cache time-to-live in hours
    #[arg(long, default_value_t = 24)]
    cache_ttl_hours: u64,

    /// Only consider PRs created within this many days (0 disables)
    #[arg(long, default_value_t = 30)]
    max_age_days: u32,
}

impl Cli {
    fn into_options(self) -> HarvestOptions {
        HarvestOptions {
            out_path: self.out,
            repo_filter: self.repo,
            min_stars: self.min_stars,
            max_repo_mb: self.max_repo_mb,
            min_files: self.min_files,
            max_files: self.max_files,
            min_lines: self.min_lines,
            max_lines: self.max_lines,
            max_repos: self.max_repos,
            max_rows: self.max_rows,
            checkpoint_every: self.autosave_every,
            verify_clone_size: self.verify_clone_size,
            workers: self.workers,
            no_cache: self.no_cache,
            cache_dir: self.cache_dir,
            cache_ttl: Duration::from_secs(self.cache_ttl_hours * 3600),
            max_age_days: self.max_age_days,
            ..HarvestOptions::default()
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let is_tty = Term::stdout().is_term();
    if !is_tty {
        // Progress bars own the terminal in TTY mode; structured logs
        // are for pipes and CI.
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let token = std::env::var("GITHUB_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    if token.is_none() {
        if is_tty {
            eprintln!("Warning: GITHUB_TOKEN is not set; unauthenticated requests are limited to 60/hour.");
        } else {
            tracing::warn!("GITHUB_TOKEN is not set; unauthenticated requests are limited to 60/hour");
        }
    }

    let options = cli.into_options();
    let shutdown = shutdown::install();
    let reporter = Arc::new(ProgressReporter::new(options.max_rows));
    let callback = reporter.as_callback();
    let transport = Arc::new(ReqwestTransport::default());

    match run_harvest(transport, token, &options, shutdown, Some(&callback)).await {
        Ok(summary) => {
            reporter.finish();
            let status = if summary.interrupted {
                "interrupted"
            } else {
                "complete"
            };
            println!(
                "Harvest {status}: {} rows saved to {} ({} repos scanned, {} PRs checked)",
                summary.rows_saved,
                options.out_path.display(),
                summary.repos_scanned,
                summary.prs_checked,
            );
        }
        Err(err) => {
            reporter.finish();
            eprintln!("Harvest failed: {err}");
            std::process::exit(1);
        }
    }
}
