//! pagebound CLI
//!
//! Finds the page of a paginated listing where the offers header appears,
//! bisecting over page numbers instead of walking every page.

use anyhow::Result;
use clap::{Parser, Subcommand};

use pagebound::init::{run_init, InitArgs};
use pagebound::lookup::{run_lookup, LookupArgs};
use pagebound::page::{run_page, PageArgs};

#[derive(Parser)]
#[command(name = "pagebound")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Find the boundary page of a paginated listing")]
#[command(long_about = "Probes the ceiling page, follows the server's redirect to the real last page, then bisects.\n\nCommands:\n  lookup   Find the boundary page of listing URLs\n  page     Inspect or rewrite a URL's page number\n  init     Create a pagebound.yaml settings template")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the boundary page of one or more listing URLs
    Lookup(LookupArgs),
    /// Inspect or rewrite the page number of a URL
    Page(PageArgs),
    /// Create pagebound.yaml with default settings
    Init(InitArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Lookup(args) => run_lookup(args).await,
        Commands::Page(args) => run_page(args).await,
        Commands::Init(args) => run_init(args).await,
    }
}
