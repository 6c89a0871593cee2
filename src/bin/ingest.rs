use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sentiment_feed::config::PipelineConfig;
use sentiment_feed::db::{ingest_stream_file, Repository};
use sentiment_feed::error::Result;

#[tokio::main]
async fn main() {
    let cfg = match PipelineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: PipelineConfig) -> Result<()> {
    let repo = Repository::connect(&cfg.db_path).await?;

    let stats = ingest_stream_file(&repo, &cfg.ingest_path).await?;
    info!(
        "Loaded {} new posts from {} ({} duplicates, {} skipped, {} unparseable)",
        stats.inserted,
        cfg.ingest_path.display(),
        stats.duplicates,
        stats.skipped,
        stats.parse_failures,
    );
    Ok(())
}
