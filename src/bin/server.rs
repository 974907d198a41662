use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result as AnyhowResult;
use clap::Parser;

use chunk_ingest::api::{self, AppState};
use chunk_ingest::config::ServerConfig;
use chunk_ingest::pipeline::{CatalogStore, CompletionPipeline};
use chunk_ingest::upload::{ChunkStore, UploadService};

#[derive(Parser)]
#[command(name = "ingest-server")]
#[command(about = "Resumable chunked upload server for datasets and model artifacts")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(short, long)]
    address: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for staged chunks
    #[arg(long)]
    uploads_dir: Option<PathBuf>,

    /// Directory for completed files
    #[arg(long)]
    completed_dir: Option<PathBuf>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<u64>,
}

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;
    if let Some(address) = cli.address {
        config.bind_address = address;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = cli.uploads_dir {
        config.uploads_dir = dir;
    }
    if let Some(dir) = cli.completed_dir {
        config.completed_dir = dir;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    config.validate()?;

    let store = Arc::new(ChunkStore::new(&config.uploads_dir, &config.completed_dir).await?);
    let service = Arc::new(UploadService::new(store, config.chunk_size));
    let catalog = Arc::new(CatalogStore::new(&config.catalog_path).await?);
    let pipeline = Arc::new(CompletionPipeline::new(catalog));

    let app = api::router(
        AppState::new(service, pipeline),
        config.body_limit_bytes(),
    );

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("🚀 Ingest server listening on {}", addr);
    println!(
        "📦 Staging chunks in {}, completing into {}",
        config.uploads_dir.display(),
        config.completed_dir.display()
    );

    axum::serve(listener, app).await?;
    Ok(())
}
