//! rsgate CLI
//!
//! Administrative and customer-facing entry points for the access-code
//! subsystem.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! rsgate --config config.yaml generate --count 100 --batch 3
//!
//! # With environment variables only
//! RSGATE_STORAGE__BACKEND=postgres \
//! RSGATE_STORAGE__DATABASE_URL=postgres://localhost/rsgate \
//!     rsgate import --file codes.txt --batch 4
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use rsgate_domain::{
    canonicalize, BatchImporter, CodeGenerator, GeneratorConfig, RedemptionEngine,
};
use rsgate_server::config::GateConfig;
use rsgate_server::logging::{init_logging, parse_log_level, LoggingConfig};
use rsgate_storage::{CodeStore, MemoryCodeStore, PostgresCodeStore, PostgresConfig};

/// rsgate - single-use access codes for gated storefront sections
#[derive(Parser, Debug)]
#[command(name = "rsgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate new unique codes under a batch number
    Generate {
        /// Number of codes to create
        #[arg(long)]
        count: usize,
        /// Batch number to tag the codes with
        #[arg(long)]
        batch: i64,
        /// Print the generated codes after the summary, one per line
        #[arg(long)]
        show_codes: bool,
    },
    /// Import codes from a file (one per line) under a batch number
    Import {
        /// File with one code per line
        #[arg(long)]
        file: PathBuf,
        /// Batch number to tag the codes with
        #[arg(long)]
        batch: i64,
    },
    /// Redeem a code on behalf of a user
    Redeem {
        #[arg(long)]
        code: String,
        /// Opaque user identifier supplied by the session layer
        #[arg(long)]
        user: String,
    },
    /// Soft-delete a code so it can never be redeemed
    Delete {
        #[arg(long)]
        code: String,
    },
    /// Report how many codes a batch holds
    Batch {
        #[arg(long)]
        batch: i64,
    },
    /// Probe the storage backend
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = if let Some(config_path) = args.config {
        GateConfig::load(&config_path)?
    } else {
        GateConfig::from_env()?
    };

    init_logging(LoggingConfig {
        json_format: config.logging.json,
        default_level: parse_log_level(&config.logging.level),
    });

    // Create the storage backend once and inject it everywhere.
    match config.storage.backend.as_str() {
        "memory" => {
            info!("Using in-memory storage backend");
            let store = Arc::new(MemoryCodeStore::new());
            run_command(store, &config, args.command).await
        }
        "postgres" => {
            let database_url = config.storage.database_url.clone().ok_or_else(|| {
                anyhow::anyhow!("storage.database_url is required for postgres backend")
            })?;

            let pg_config = PostgresConfig {
                database_url,
                max_connections: config.storage.pool_size,
                min_connections: 1,
                connect_timeout_secs: config.storage.connection_timeout_secs,
            };

            let store = PostgresCodeStore::from_config(&pg_config).await?;
            store.run_migrations().await?;
            info!("PostgreSQL connection established");

            run_command(Arc::new(store), &config, args.command).await
        }
        other => anyhow::bail!("unsupported storage backend: {other}"),
    }
}

async fn run_command<S: CodeStore>(
    store: Arc<S>,
    config: &GateConfig,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Generate {
            count,
            batch,
            show_codes,
        } => {
            let generator = CodeGenerator::with_config(
                Arc::clone(&store),
                GeneratorConfig {
                    length: config.codes.length,
                    alphabet: config.codes.alphabet.clone(),
                    ..Default::default()
                },
            );
            let codes = generator.generate(count, batch).await?;

            let summary = serde_json::json!({
                "requested": count,
                "created": codes.len(),
                "batch": batch,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if show_codes {
                for code in &codes {
                    println!("{code}");
                }
            }
            Ok(())
        }
        Command::Import { file, batch } => {
            let contents = tokio::fs::read_to_string(&file).await?;
            // Blank lines are file formatting, not candidate codes.
            let raw: Vec<String> = contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();

            let importer = BatchImporter::with_length(Arc::clone(&store), config.codes.length);
            let summary = importer.import_batch(&raw, batch).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Redeem { code, user } => {
            let engine = RedemptionEngine::with_length(Arc::clone(&store), config.codes.length);
            let row = engine.redeem(&code, &user).await?;

            let payload = serde_json::json!({
                "code": row.code,
                "batch": row.batch,
                "used_by": row.used_by,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Command::Delete { code } => {
            let canonical = canonicalize(&code, config.codes.length)?;
            if !store.soft_delete(&canonical).await? {
                anyhow::bail!("code {canonical} was not deleted: absent or already deleted");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "code": canonical,
                    "deleted": true,
                }))?
            );
            Ok(())
        }
        Command::Batch { batch } => {
            let count = store.count_batch(batch).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "batch": batch,
                    "codes": count,
                }))?
            );
            Ok(())
        }
        Command::Status => {
            let status = store.health_check().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "healthy": status.healthy,
                    "latency_ms": status.latency.as_millis() as u64,
                    "message": status.message,
                }))?
            );
            if !status.healthy {
                anyhow::bail!("storage backend is unhealthy");
            }
            Ok(())
        }
    }
}
