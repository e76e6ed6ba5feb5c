//! Hearth CLI: operator access to the media pipeline.
//!
//! Configuration comes from `HEARTH_*` variables (see `MediaConfig`). Every
//! command except `compress` needs `HEARTH_DATABASE_URL`.

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use hearth_cli::{content_type_for_path, init_tracing, load_file, FileArg};
use hearth_core::MediaConfig;
use hearth_db::{connect, PgEntityStore};
use hearth_media::MediaLifecycleCoordinator;
use hearth_processing::{CompressionSettings, SizeBudgetCompressor};
use hearth_storage::{create_storage, DeletionOutcome};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hearth", about = "Media ingestion pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress one image to the configured size budget without uploading it
    Compress {
        input: PathBuf,
        output: PathBuf,
        /// Override the budget in bytes
        #[arg(long)]
        budget: Option<usize>,
        /// Override the maximum width in pixels
        #[arg(long)]
        max_width: Option<u32>,
    },
    /// Create a parent entity with media
    Create {
        /// Parent fields as a JSON object
        #[arg(long, default_value = "{}")]
        fields: String,
        /// Files as `label=path` or `path`; none creates a parent without media
        files: Vec<FileArg>,
    },
    /// Attach media to an existing parent entity
    Attach {
        /// Parent UUID
        #[arg(long)]
        parent: Uuid,
        #[arg(required = true)]
        files: Vec<FileArg>,
    },
    /// Delete one media asset
    DeleteMedia {
        /// Media UUID
        id: Uuid,
    },
    /// Delete a parent entity and all of its media
    DeleteParent {
        /// Parent UUID
        id: Uuid,
    },
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn coordinator(config: &MediaConfig) -> anyhow::Result<MediaLifecycleCoordinator> {
    let database_url = config
        .database_url
        .as_deref()
        .context("HEARTH_DATABASE_URL is required")?;
    let pool = connect(database_url).await?;
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;

    Ok(MediaLifecycleCoordinator::new(
        config,
        storage,
        Arc::new(PgEntityStore::new(pool)),
    ))
}

fn compress(
    config: &MediaConfig,
    input: PathBuf,
    output: PathBuf,
    budget: Option<usize>,
    max_width: Option<u32>,
) -> anyhow::Result<()> {
    let data = std::fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?;
    let input_bytes = data.len();
    let compressor = SizeBudgetCompressor::new(CompressionSettings {
        budget_bytes: budget.unwrap_or(config.compression_budget_bytes),
        max_width: max_width.unwrap_or(config.compression_max_width),
    });

    let outcome = compressor.compress(Bytes::from(data), &content_type_for_path(&input))?;
    std::fs::write(&output, &outcome.data)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_json(&json!({
        "input_bytes": input_bytes,
        "output_bytes": outcome.data.len(),
        "content_type": outcome.content_type,
        "exit": format!("{:?}", outcome.exit),
        "attempts": outcome.attempts,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = MediaConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Compress {
            input,
            output,
            budget,
            max_width,
        } => {
            compress(&config, input, output, budget, max_width)?;
        }
        Commands::Create { fields, files } => {
            let fields: serde_json::Value =
                serde_json::from_str(&fields).context("--fields must be valid JSON")?;
            let files = files.iter().map(load_file).collect::<anyhow::Result<Vec<_>>>()?;

            let created = coordinator(&config)
                .await?
                .create_with_media(fields, files)
                .await?;
            print_json(&json!({
                "parent_id": created.parent_id,
                "media": created.media,
            }))?;
        }
        Commands::Attach { parent, files } => {
            let files = files.iter().map(load_file).collect::<anyhow::Result<Vec<_>>>()?;
            let media = coordinator(&config).await?.add_media(parent, files).await?;
            print_json(&json!({ "parent_id": parent, "media": media }))?;
        }
        Commands::DeleteMedia { id } => {
            let deletion = coordinator(&config).await?.delete_media(id).await?;
            let (object_deleted, error) = match deletion.storage {
                DeletionOutcome::Deleted => (true, None),
                DeletionOutcome::Failed(reason) => (false, Some(reason)),
            };
            print_json(&json!({
                "media_id": deletion.media_id,
                "object_deleted": object_deleted,
                "error": error,
            }))?;
        }
        Commands::DeleteParent { id } => {
            let report = coordinator(&config).await?.delete_parent(id).await?;
            print_json(&report.to_json())?;
        }
    }

    Ok(())
}
