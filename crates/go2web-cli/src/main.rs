//! go2web CLI - fetch a page or search the web from the terminal

use anyhow::Context;
use clap::{CommandFactory, Parser};
use go2web::{extract, search, Cache, Client, Config, DiskCache, NoCache, Target};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Configuration file read from the working directory when present
const DEFAULT_CONFIG_FILE: &str = "Config.json";

/// Printed between the output of several actions
const DIVIDER: &str = "----------------------------------------";

/// go2web - make HTTP requests and search the web from the terminal
#[derive(Parser, Debug)]
#[command(name = "go2web")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Make an HTTP request to the URL and print the response
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,

    /// Search the terms with the configured search engine and print the top results
    #[arg(short, long, value_name = "TERM", num_args = 1..)]
    search: Option<Vec<String>>,

    /// Delete every cached page
    #[arg(short, long)]
    clear_cache: bool,

    /// Log response headers as they are received
    #[arg(short = 'H', long)]
    headers: bool,

    /// Neither read nor write the page cache
    #[arg(long)]
    no_cache: bool,

    /// Print the response body as received, without extracting text
    #[arg(long)]
    raw: bool,

    /// Configuration file (defaults to ./Config.json when it exists)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn has_action(&self) -> bool {
        self.url.is_some() || self.search.is_some() || self.clear_cache
    }
}

/// A page ready for printing
#[derive(Debug)]
struct Page {
    url: Url,
    content_type: Option<String>,
    body: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.headers);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(headers: bool) {
    let default = if headers {
        "warn,go2web=info"
    } else {
        "warn,go2web::redirect=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if !cli.has_action() {
        Cli::command().print_help()?;
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    config.log_headers = cli.headers;

    let cache: Box<dyn Cache> = if cli.no_cache {
        Box::new(NoCache)
    } else {
        Box::new(DiskCache::new(&config.cache_directory, config.encoding))
    };

    let mut printed = false;

    if cli.clear_cache {
        let count = cache.clear().await.context("failed to clear cache")?;
        writeln_safe(&format!("Cleared {} cached page(s)", count));
        printed = true;
    }

    if cli.url.is_none() && cli.search.is_none() {
        return Ok(());
    }

    let client = Client::new(&config).context("failed to set up HTTP client")?;

    if let Some(url) = &cli.url {
        if printed {
            writeln_safe(DIVIDER);
        }
        let target = Target::parse(url)?;
        let page = fetch_page(&client, cache.as_ref(), &target).await?;
        writeln_safe(&render(&page, cli.raw));
        printed = true;
    }

    if let Some(terms) = &cli.search {
        if printed {
            writeln_safe(DIVIDER);
        }
        let target = search::search_url(&config.search_engine, terms)?;
        // Result pages differ only by query, so they never go through the cache
        let page = fetch_page(&client, &NoCache, &target).await?;
        if cli.raw {
            writeln_safe(&page.body);
        } else {
            let found = search::results(&page.body, &page.url, search::DEFAULT_RESULT_LIMIT);
            writeln_safe(&format_results(&found));
        }
    }

    Ok(())
}

/// Load configuration from `path`, else `./Config.json` if present, else defaults
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::read(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Config::read(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("failed to load config {}", DEFAULT_CONFIG_FILE)),
        None => Ok(Config::default()),
    }
}

/// Serve `target` from the cache, or fetch it and cache a successful body
async fn fetch_page(client: &Client, cache: &dyn Cache, target: &Target) -> anyhow::Result<Page> {
    if let Some(page) = cached_page(cache, target).await {
        return Ok(page);
    }

    let response = client
        .fetch_following(target)
        .await
        .with_context(|| format!("failed to fetch {}", target))?;

    if response.is_success() {
        if let Err(e) = cache.put(target, &response.body).await {
            warn!("Could not cache {}: {}", target, e);
        }
    } else {
        warn!("{} responded with {}", response.url, response.status);
    }

    Ok(Page {
        url: response.url.clone(),
        content_type: response.content_type().map(str::to_string),
        body: response.body,
    })
}

/// Cached copy of `target`; an unreadable entry counts as a miss
async fn cached_page(cache: &dyn Cache, target: &Target) -> Option<Page> {
    match cache.get(target).await {
        Ok(Some(body)) => {
            info!("Serving {} from cache", target);
            Some(Page {
                url: target.url().clone(),
                content_type: None,
                body,
            })
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Could not read cache for {}: {}", target, e);
            None
        }
    }
}

/// Extract readable text from HTML pages; anything else prints as is
fn render(page: &Page, raw: bool) -> String {
    if !raw && extract::is_html(page.content_type.as_deref(), &page.body) {
        extract::page_text(&page.body, &page.url)
    } else {
        page.body.clone()
    }
}

fn format_results(results: &[go2web::SearchResult]) -> String {
    if results.is_empty() {
        return "No results found".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("{}. {}", i + 1, result))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
