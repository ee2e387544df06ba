use anyhow::Result;
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};

mod branches;
mod config;
mod github;
mod output;
mod stats;

use config::{TimeWindow, Visibility};
use github::repos::RepoFilter;
use github::GithubClient;
use output::Reporter;
use stats::OrgTotals;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// GitHub organization login
    #[arg(short, long)]
    org: String,

    /// Regex of base branches to include
    #[arg(short, long, default_value = r"^(master|main|develop|staging|testing)$")]
    branches: String,

    /// Include PRs merged at or after this time (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,

    /// Include PRs merged at or before this time (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    until: Option<String>,

    /// Include forked repositories
    #[arg(long)]
    include_forks: bool,

    /// Include archived repositories
    #[arg(long)]
    include_archived: bool,

    /// Repository visibility (all, public, private)
    #[arg(long, default_value = "all")]
    visibility: String,

    /// Safety cap: stop after N repositories (0 = no cap)
    #[arg(long, default_value = "0")]
    max_repos: usize,

    /// Safety cap: max PRs to scan per branch per repository
    #[arg(long, default_value = "1000")]
    max_per_branch: usize,

    /// Output format (csv, json)
    #[arg(short, long, default_value = "csv")]
    format: String,

    /// Write the report to a file (default stdout)
    #[arg(long)]
    out: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr; stdout is reserved for the report.
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    eprintln!(
        "{}",
        "PRTally - Merged PR Statistics by Author"
            .bright_cyan()
            .bold()
    );
    eprintln!("Organization: {}", cli.org.bright_white());

    let token = config::github_token()?;

    let selected = branches::select_branches(&cli.branches)?;
    if selected.is_empty() {
        warn!("no branches match regex; nothing to do");
        return Ok(());
    }
    info!("Scanning base branches: {}", selected.join(", "));

    let window = TimeWindow::new(cli.since.as_deref(), cli.until.as_deref());
    let filter = RepoFilter {
        include_forks: cli.include_forks,
        include_archived: cli.include_archived,
        visibility: Visibility::parse(&cli.visibility),
        max_repos: cli.max_repos,
    };

    let client = GithubClient::new(token)?;

    let repos = github::repos::list_repositories(&client, &cli.org, &filter).await?;
    if repos.is_empty() {
        warn!("no repositories to scan");
        return Ok(());
    }
    info!("Found {} repositories in {}", repos.len(), cli.org);

    let pb = ProgressBar::new(repos.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} repos ({eta})",
        )?
        .progress_chars("#>-"),
    );

    let mut rows = Vec::new();
    let mut org_totals = OrgTotals::default();
    for repo in &repos {
        let per_repo = github::pulls::aggregate_pull_requests(
            &client,
            &cli.org,
            repo,
            &selected,
            &window,
            cli.max_per_branch,
        )
        .await?;
        rows.extend(stats::build_rows(&cli.org, repo, &per_repo));
        org_totals.absorb(&per_repo);
        pb.inc(1);
    }
    pb.finish_with_message("Aggregation complete");

    stats::sort_rows(&mut rows);

    let reporter = Reporter::new(&cli.format, cli.out);
    reporter.write_report(&rows)?;

    output::print_summary(repos.len(), &org_totals.ranked());

    Ok(())
}
