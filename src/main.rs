// CLI entry point.
// `serve` runs the edge gateway; `repos` runs the client boot sequence and prints the list.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use repo_shelf::client::{self, FetchOptions, LoadState, RepoView, Source};
use repo_shelf::config::{
    ClientConfig, DEFAULT_API_BASE, DEFAULT_CACHE_KEY, DEFAULT_FRESH_SECS, DEFAULT_LISTEN,
    DEFAULT_MAX_REPOS, DEFAULT_PER_PAGE, DEFAULT_STALE_SECS, Endpoint, GatewayConfig,
    UpstreamConfig,
};
use repo_shelf::gateway;

#[derive(Parser, Debug)]
#[command(name = "repo-shelf", about = "Cached GitHub repository list for a portfolio site")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the caching gateway.
    Serve(ServeArgs),
    /// Show the repository list the way a browser would load it.
    Repos(ReposArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// GitHub account whose repositories are listed.
    #[arg(long, env = "SHELF_USER")]
    user: String,

    #[arg(long, env = "SHELF_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    #[arg(long, env = "SHELF_LISTEN", default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,

    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    per_page: u32,

    #[arg(long, default_value_t = DEFAULT_MAX_REPOS)]
    max_repos: usize,

    #[arg(long, default_value_t = 4000)]
    upstream_timeout_ms: u64,

    #[arg(long, default_value_t = DEFAULT_FRESH_SECS)]
    fresh_secs: u64,

    #[arg(long, default_value_t = DEFAULT_STALE_SECS)]
    stale_secs: u64,

    /// Collapse concurrent background refreshes into one upstream call.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    dedupe_refresh: bool,
}

#[derive(Args, Debug)]
struct ReposArgs {
    /// GitHub account used for the direct fallback URL.
    #[arg(long, env = "SHELF_USER")]
    user: String,

    #[arg(long, value_enum, default_value_t = Endpoint::Upstream)]
    endpoint: Endpoint,

    #[arg(long, env = "SHELF_GATEWAY_URL", default_value = "http://127.0.0.1:8787/api/repos")]
    gateway_url: String,

    /// Override the direct GitHub URL.
    #[arg(long)]
    fallback_url: Option<String>,

    #[arg(long, default_value_t = 5000)]
    client_timeout_ms: u64,

    #[arg(long, default_value = DEFAULT_CACHE_KEY)]
    cache_key: String,

    #[arg(long, env = "SHELF_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Repos(args) => repos(args).await,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut upstream = UpstreamConfig::from_env(args.user).context("upstream credential")?;
    upstream.api_base = args.api_base;
    upstream.per_page = args.per_page;
    upstream.max_repos = args.max_repos;
    upstream.timeout = Duration::from_millis(args.upstream_timeout_ms);

    let gateway_config = GatewayConfig {
        listen: args.listen,
        fresh_for: Duration::from_secs(args.fresh_secs),
        stale_for: Duration::from_secs(args.stale_secs),
        dedupe_refresh: args.dedupe_refresh,
    };

    gateway::run(gateway_config, &upstream)
        .await
        .context("gateway failed")
}

async fn repos(args: ReposArgs) -> Result<()> {
    let mut config = ClientConfig::new(args.gateway_url, &args.user);
    config.endpoint = args.endpoint;
    if let Some(url) = args.fallback_url {
        config.fallback_url = url;
    }
    config.timeout = Duration::from_millis(args.client_timeout_ms);
    config.cache_key = args.cache_key;
    config.cache_dir = args.cache_dir;

    tracing::debug!(url = %config.url(), "client endpoint");
    let client = client::from_config(&config).context("client setup")?;
    let options = FetchOptions::from(&config);

    let state = client.load(&options, print_state).await;
    if let LoadState::Unavailable(reason) = state {
        anyhow::bail!("no repository data available: {}", reason);
    }
    Ok(())
}

fn print_state(state: &LoadState) {
    match state {
        LoadState::Loading => eprintln!("Loading repositories..."),
        LoadState::Ready(view) => print_view(view),
        LoadState::Unavailable(reason) => eprintln!("Failed to load repositories: {}", reason),
    }
}

fn print_view(view: &RepoView) {
    let label = match view.source {
        Source::Cache => "Cached",
        Source::Network => "Synced",
    };
    match view.generated_at {
        Some(at) => println!("{}: {}", label, at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("{}", label),
    }

    if view.repos.is_empty() {
        println!("No repositories found.");
        return;
    }
    for repo in &view.repos {
        println!(
            "  {:<32} ★{:<5} {:<12} {}",
            repo.name,
            repo.star_count,
            repo.primary_language.as_deref().unwrap_or("No Lang"),
            repo.updated_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        );
    }
}
