//! Operator CLI for encore.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use encore_assets::{AssetPipeline, metrics};
use encore_core::config::AppConfig;
use encore_core::keys::staging_key;
use encore_core::{AssetDomain, ImageId, UserId, content_type_for_path};
use encore_metadata::{ImageRepo, SqliteStore};
use encore_storage::{ObjectStore, PutOptions};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "encorectl")]
#[command(about = "Operator CLI for the encore asset pipeline")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "ENCORE_CONFIG",
        default_value = "config/encore.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the metadata store and apply the schema
    Migrate,
    /// Check storage and metadata connectivity
    Check,
    /// Upload a local file to a fresh staging key
    Stage {
        /// Owning domain (artist, group, event, review, user)
        #[arg(long)]
        domain: AssetDomain,
        /// Also register a TMP image owned by this user
        #[arg(long)]
        owner: Option<Uuid>,
        file: PathBuf,
    },
    /// Promote a TMP image now, rendering the domain's preset
    Promote {
        #[arg(long)]
        domain: AssetDomain,
        image_id: String,
        /// Owner to promote as (defaults to the row's owner)
        #[arg(long)]
        owner: Option<Uuid>,
    },
    /// Soft-delete images that nothing references
    Reclaim {
        #[arg(required = true)]
        image_ids: Vec<String>,
    },
    /// Print this process's metrics in the Prometheus text format
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let load = || load_config(Path::new(&cli.config));

    match cli.command {
        Commands::Migrate => {
            let config = load()?;
            let metadata = open_metadata(&config).await?;
            metadata.migrate().await.context("failed to apply schema")?;
            println!("Schema applied");
        }
        Commands::Check => {
            let config = load()?;
            let storage = open_storage(&config).await?;
            storage
                .health_check()
                .await
                .context("storage health check failed")?;
            println!("storage ({}): ok", storage.backend_name());

            let metadata = open_metadata(&config).await?;
            metadata
                .health_check()
                .await
                .context("metadata health check failed")?;
            println!("metadata: ok");
        }
        Commands::Stage {
            domain,
            owner,
            file,
        } => {
            let config = load()?;
            let storage = open_storage(&config).await?;
            let key = stage_file(storage.as_ref(), domain, &file).await?;

            let image_id = match owner {
                Some(owner) => {
                    let metadata = open_metadata(&config).await?;
                    let pipeline = AssetPipeline::new(storage, metadata.clone(), &config.assets)?;
                    let mut uow = metadata.begin().await?;
                    let image_id = pipeline
                        .attachments
                        .create_tmp_image(&mut uow, &key, Some(UserId::from_uuid(owner)))
                        .await
                        .context("failed to register staged image")?;
                    uow.commit().await?;
                    Some(image_id)
                }
                None => None,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "key": key, "image_id": image_id }))?
            );
        }
        Commands::Promote {
            domain,
            image_id,
            owner,
        } => {
            let image_id = ImageId::parse(&image_id)?;
            let config = load()?;
            let storage = open_storage(&config).await?;
            let metadata = open_metadata(&config).await?;
            let pipeline = AssetPipeline::new(storage, metadata.clone(), &config.assets)?;

            let row = {
                let mut conn = metadata.acquire().await?;
                conn.find_image(image_id)
                    .await?
                    .with_context(|| format!("image {image_id} not found"))?
            };
            let owner = owner.map(UserId::from_uuid).unwrap_or_else(|| row.owner());

            let outcome = pipeline
                .promotion
                .promote_now(image_id, &row.object_key, owner, domain.preset())
                .await
                .with_context(|| format!("failed to promote image {image_id}"))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Reclaim { image_ids } => {
            let ids = image_ids
                .iter()
                .map(|id| ImageId::parse(id))
                .collect::<Result<Vec<_>, _>>()?;
            let config = load()?;
            let storage = open_storage(&config).await?;
            let metadata = open_metadata(&config).await?;
            let pipeline = AssetPipeline::new(storage, metadata, &config.assets)?;

            let report = pipeline
                .reclaimer
                .reclaim(&ids, pipeline.usage.as_ref())
                .await
                .context("reclaim failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Metrics => {
            metrics::register_metrics();
            print!("{}", metrics::encode_text().context("failed to encode metrics")?);
        }
    }

    Ok(())
}

/// Load configuration: optional TOML file, then `ENCORE_` environment
/// variables (`__` separates nesting levels).
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path.display());
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("ENCORE_").ignore(&["CONFIG"]).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;
    Ok(config)
}

async fn open_storage(config: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    encore_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")
}

async fn open_metadata(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    encore_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")
}

/// Upload `file` under a fresh staging key for `domain` and return the key.
async fn stage_file(storage: &dyn ObjectStore, domain: AssetDomain, file: &Path) -> Result<String> {
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", file.display()))?;
    let content_type = content_type_for_path(&filename)
        .with_context(|| format!("{filename} is not a supported image type"))?;
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let key = staging_key(domain, OffsetDateTime::now_utc(), Uuid::new_v4(), &filename);
    storage
        .put(
            &key,
            Bytes::from(data),
            PutOptions {
                content_type: Some(content_type.to_string()),
                cache_control: None,
            },
        )
        .await
        .with_context(|| format!("failed to upload {key}"))?;
    tracing::info!(key = %key, content_type, "staged upload");
    Ok(key)
}
