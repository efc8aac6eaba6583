use anyhow::Result;
use clap::{Parser, Subcommand};

use catalog_sync::cli;
use catalog_sync::database_ops::Table;
use catalog_sync::logging::init_tracing;
use catalog_sync::util::env as env_util;

#[derive(Parser, Debug)]
#[command(name = "catalog-sync", version, about = "Seller catalog sync into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Sync every tenant of a marketplace and print the run summary
    Sync {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        /// Overrides MARKETPLACE_ID
        #[arg(long)]
        marketplace_id: Option<i64>,
        /// Sync only this tenant
        #[arg(long)]
        tenant: Option<i64>,
    },
    /// Delete duplicate rows, keeping the newest per identity
    Dedupe {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        /// One table (product_attributes, category, category_attributes,
        /// attribute_dictionary_value); all when omitted
        #[arg(long)]
        table: Option<Table>,
    },
    /// Validate and print the redacted configuration
    Preflight,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info,sqlx=warn")?;

    match Cli::parse().command {
        Commands::Sync {
            db_url,
            marketplace_id,
            tenant,
        } => {
            use cli::sync::{run, SyncCommandConfig};
            run(SyncCommandConfig {
                database_url: db_url,
                marketplace_id,
                tenant,
            })
            .await?;
        }
        Commands::Dedupe { db_url, table } => {
            use cli::dedupe::{run, DedupeConfig};
            run(DedupeConfig {
                database_url: db_url,
                table,
            })
            .await?;
        }
        Commands::Preflight => cli::preflight::run()?,
    }
    Ok(())
}
