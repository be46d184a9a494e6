//! Pitwall CLI - Formula 1 data from the OpenF1 API
//!
//! Fetches OpenF1 endpoints through a local response cache, exports payloads
//! to JSON files and manages the cache.

use std::error::Error;
use std::path::Path;
use std::process;

use chrono::Local;
use clap::Parser;

use pitwall::cache::{CacheStats, CacheStore};
use pitwall::cli::{CacheAction, Cli, Command};
use pitwall::config::Config;
use pitwall::data::{ApiRequest, FetchError, OpenF1Client};
use pitwall::export::{default_filename, export_json, unique_endpoints};
use pitwall::logging;

/// Builds a request for an endpoint with the given parameters
fn build_request(endpoint: &str, params: &[(String, String)]) -> ApiRequest {
    params
        .iter()
        .fold(ApiRequest::new(endpoint), |request, (key, value)| {
            request.param(key.as_str(), value)
        })
}

/// Prints a fetch failure with a hint matching its class
fn report_fetch_error(err: &FetchError) {
    eprintln!("✗ {}", err);
    if let FetchError::ClientError { status: 404 } = err {
        eprintln!("Check the endpoint name and parameters.");
    }
}

/// Prints cache statistics
fn print_stats(cache: &CacheStore, stats: &CacheStats) {
    println!("Cache directory: {}", cache.dir().display());
    println!("Total entries:   {}", stats.total);
    println!("Total size:      {} bytes", stats.total_size);
    if let Some(oldest) = stats.oldest {
        println!("Oldest entry:    {}", oldest.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(newest) = stats.newest {
        println!("Newest entry:    {}", newest.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
    }
    if !stats.by_category.is_empty() {
        println!("By category:");
        for (category, count) in &stats.by_category {
            println!("  {:<16}{}", category, count);
        }
    }
}

/// Runs a cache maintenance subcommand
fn run_cache(cache: &CacheStore, action: CacheAction) -> Result<(), Box<dyn Error>> {
    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            print_stats(cache, &stats);
        }
        CacheAction::Clear { category } => {
            let cleared = cache.clear(category.as_deref())?;
            match category {
                Some(category) => println!("✓ Cleared {} cache entries for endpoint '{}'", cleared, category),
                None => println!("✓ Cleared {} cache entries", cleared),
            }
        }
        CacheAction::Info => {
            println!("Cache directory: {}", cache.dir().display());
        }
    }
    Ok(())
}

/// Fetches one endpoint and prints the payload to stdout
///
/// Returns `false` if the fetch failed.
async fn run_fetch(
    client: &OpenF1Client,
    base_url: &str,
    endpoint: &str,
    params: &[(String, String)],
    refresh: bool,
) -> Result<bool, Box<dyn Error>> {
    let url = build_request(endpoint, params).url(base_url);

    match client.fetch(&url, refresh).await {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(true)
        }
        Err(err) => {
            report_fetch_error(&err);
            Ok(false)
        }
    }
}

/// Fetches several endpoints concurrently and writes each to a JSON file
///
/// Returns `false` if any endpoint could not be exported.
async fn run_export(
    client: &OpenF1Client,
    base_url: &str,
    endpoints: &[String],
    params: &[(String, String)],
    dir: &Path,
    refresh: bool,
) -> Result<bool, Box<dyn Error>> {
    std::fs::create_dir_all(dir)?;

    // Repeats would write the same timestamped file twice
    let endpoints = unique_endpoints(endpoints);
    let urls: Vec<String> = endpoints
        .iter()
        .map(|endpoint| build_request(endpoint, params).url(base_url))
        .collect();
    let results = client.fetch_all(&urls, refresh).await;

    let now = Local::now();
    let mut all_ok = true;
    for ((endpoint, url), result) in endpoints.iter().zip(&urls).zip(results) {
        let payload = match result {
            Ok(payload) => payload,
            Err(err) => {
                eprint!("{}: ", endpoint);
                report_fetch_error(&err);
                all_ok = false;
                continue;
            }
        };

        let path = dir.join(default_filename(endpoint, now));
        match export_json(&payload, &path) {
            Ok(count) => println!("✓ {} exported to {} ({} records)", endpoint, path.display(), count),
            Err(err) => {
                eprintln!("✗ {} ({}): {}", endpoint, url, err);
                all_ok = false;
            }
        }
    }

    Ok(all_ok)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    logging::init(&config.log_level, &config.log_format);

    let cache = CacheStore::with_dir(config.resolved_cache_dir(), config.expiration_policy());

    let succeeded = match cli.command {
        Command::Cache { action } => {
            run_cache(&cache, action)?;
            true
        }
        Command::Fetch {
            endpoint,
            params,
            refresh,
        } => {
            let client = OpenF1Client::with_settings(cache, config.client_settings())?;
            run_fetch(&client, &config.base_url, &endpoint, &params, refresh).await?
        }
        Command::Export {
            endpoints,
            params,
            dir,
            refresh,
        } => {
            let client = OpenF1Client::with_settings(cache, config.client_settings())?;
            run_export(&client, &config.base_url, &endpoints, &params, &dir, refresh).await?
        }
    };

    if !succeeded {
        process::exit(1);
    }
    Ok(())
}
