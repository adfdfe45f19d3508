//! Shopvox CLI - database migrations, catalog seeding and embedding maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! svx migrate
//!
//! # Seed a shop's catalog from YAML (and embed it right away)
//! svx seed catalog data/catalog.yaml --hostname shop.example.com --embed
//!
//! # Embed rows with missing vectors
//! svx embeddings backfill [--hostname shop.example.com]
//!
//! # Recompute one product's vectors
//! svx embeddings reindex 42
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "svx")]
#[command(author, version, about = "Shopvox CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Maintain product and variant embeddings
    Embeddings {
        #[command(subcommand)]
        action: EmbeddingsAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load products and variants from a YAML file
    Catalog {
        /// Path to the catalog YAML file
        file: PathBuf,

        /// Hostname of the shop the catalog belongs to
        #[arg(long)]
        hostname: String,

        /// Delete the shop's existing products first
        #[arg(long)]
        replace: bool,

        /// Embed the new rows after seeding
        #[arg(long)]
        embed: bool,
    },
}

#[derive(Subcommand)]
enum EmbeddingsAction {
    /// Embed every row whose vector is missing
    Backfill {
        /// Limit to one shop
        #[arg(long)]
        hostname: Option<String>,
    },
    /// Recompute a product and its variants
    Reindex {
        /// Product id
        product_id: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog {
                file,
                hostname,
                replace,
                embed,
            } => {
                let catalog = commands::catalog::load(&file).await?;
                let pool = commands::embeddings::connect().await?;
                commands::catalog::seed(&pool, &hostname, &catalog, replace).await?;
                if embed {
                    commands::embeddings::backfill(&pool, Some(&hostname)).await?;
                }
            }
        },
        Commands::Embeddings { action } => {
            let pool = commands::embeddings::connect().await?;
            match action {
                EmbeddingsAction::Backfill { hostname } => {
                    commands::embeddings::backfill(&pool, hostname.as_deref()).await?;
                }
                EmbeddingsAction::Reindex { product_id } => {
                    commands::embeddings::reindex(&pool, product_id).await?;
                }
            }
        }
    }
    Ok(())
}
