//! CLI binary for pricewise.
//!
//! Results are printed to stdout as JSON; all logging goes to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pricewise::{output, App, PricewiseConfig, SearchRequest};
use pricewise_search::{CancellationToken, SortStrategy};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

/// Pricewise: compare product prices across marketplaces, import taxes included.
#[derive(Parser)]
#[command(name = "pricewise", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search marketplaces and print the merged, ranked page.
    Search {
        /// Search text.
        query: String,
        /// Marketplace to include (repeatable), e.g. MLC or EBAY_US.
        #[arg(short, long = "marketplace")]
        marketplaces: Vec<String>,
        /// Destination country for import tax estimates (ISO 3166-1 alpha-2).
        #[arg(long)]
        country: Option<String>,
        /// relevance, price-asc, price-desc, newest or best-seller.
        #[arg(short, long, default_value = "relevance")]
        sort: SortStrategy,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long)]
        min_price: Option<Decimal>,
        #[arg(long)]
        max_price: Option<Decimal>,
    },

    /// Fetch one listing by marketplace and listing id.
    Product {
        marketplace: String,
        id: String,
    },

    /// Check every configured marketplace.
    Health,

    /// List destination countries with a tax profile.
    Countries,

    /// Write a default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct CountryRow<'a> {
    code: &'a str,
    name: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::InitConfig { force } = cli.command {
        return init_config(cli.config, force);
    }

    let config = PricewiseConfig::load(cli.config.as_deref())?;
    let _log_guard = pricewise::logging::init(&config.logging)?;
    let app = App::from_config(config)?;

    match cli.command {
        Command::Search {
            query,
            marketplaces,
            country,
            sort,
            page,
            page_size,
            min_price,
            max_price,
        } => {
            let request = SearchRequest {
                query,
                marketplaces,
                country,
                sort,
                page,
                page_size,
                min_price,
                max_price,
            };
            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("received Ctrl+C, cancelling search");
                    cancel_clone.cancel();
                }
            });
            let result = app.search(request, &cancel).await?;
            println!("{}", output::search_json(&result, cli.pretty)?);
            Ok(())
        }
        Command::Product { marketplace, id } => {
            let product = app.product(&marketplace, &id).await?;
            print_json(&product, cli.pretty)
        }
        Command::Health => {
            let health = app.orchestrator().healthcheck().await;
            print_json(&health, cli.pretty)
        }
        Command::Countries => {
            let countries = app.tax().supported_countries();
            let rows: Vec<CountryRow<'_>> = countries
                .iter()
                .map(|(code, name)| CountryRow {
                    code: code.as_str(),
                    name,
                })
                .collect();
            print_json(&rows, cli.pretty)
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(PricewiseConfig::default_config_path);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    PricewiseConfig::default().save_to_file(&path)?;
    println!("{}", path.display());
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    println!("{}", output::to_json(value, pretty)?);
    Ok(())
}
