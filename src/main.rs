use std::sync::Arc;

use tracing::{error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use sentiment_feed::api::{router, ApiState, SessionStats, StatsSnapshot};
use sentiment_feed::config::StreamConfig;
use sentiment_feed::error::Result;
use sentiment_feed::stream::{FileListener, StreamSession, TwitterClient};

#[tokio::main]
async fn main() {
    let cfg = match StreamConfig::from_env() {
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

async fn run(cfg: StreamConfig) -> Result<()> {
    let stats = Arc::new(SessionStats::new());

    // Status endpoint
    if let Some(port) = cfg.api_port {
        let app = router(ApiState {
            stats: stats.clone(),
        });
        let bind_addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        info!("HTTP API listening on {bind_addr}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP API stopped: {e}");
            }
        });
    }

    let span = info_span!(
        "stream_session",
        output = %cfg.output_path.display(),
        stop = %cfg.stop_condition,
        follows = cfg.filter.follow_list.len(),
        track = cfg.filter.track_list.len(),
    );
    let handler = FileListener::open(&cfg.output_path, cfg.stop_condition, stats.clone())?;
    let client = TwitterClient::new(&cfg)?;
    let session = StreamSession::new(client, cfg.filter.clone(), handler, stats.clone(), span);

    let summary = if cfg.filter.is_async {
        let handle = session.spawn();
        tokio::select! {
            joined = handle => match joined {
                Ok(result) => result?,
                Err(e) => {
                    error!("stream task failed: {e}");
                    stats.snapshot()
                }
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, abandoning stream session");
                stats.snapshot()
            }
        }
    } else {
        session.run().await?
    };

    log_summary(&summary);
    Ok(())
}

fn log_summary(s: &StatsSnapshot) {
    info!(
        state = %s.state,
        received = s.events_received,
        written = s.events_written,
        filtered = s.events_filtered,
        parse_failures = s.parse_failures,
        write_failures = s.write_failures,
        reconnects = s.reconnects,
        "Stream session finished"
    );
}
