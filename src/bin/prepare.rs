use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use sentiment_feed::config::PipelineConfig;
use sentiment_feed::db::Repository;
use sentiment_feed::error::Result;
use sentiment_feed::output::write_all;
use sentiment_feed::pipeline::{join_series, prepare, rename_fin_columns, PrepareOptions};
use sentiment_feed::sentiment::{build_scorer, score_posts};

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

    let span = info_span!("prepare", model = %cfg.model, db = %cfg.db_path);
    if let Err(e) = run(cfg).instrument(span).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: PipelineConfig) -> Result<()> {
    let repo = Repository::connect(&cfg.db_path).await?;

    if cfg.score_missing {
        let scorer = build_scorer(&cfg)?;
        score_posts(&repo, scorer.as_ref()).await?;
    }

    let (vix, spx, posts, accounts) = repo.fetch_data().await?;
    let (vix, spx) = rename_fin_columns(vix, spx);
    let market = join_series(&vix, &spx);

    let scored = prepare(
        posts,
        &accounts,
        cfg.model,
        PrepareOptions {
            threshold: cfg.threshold,
        },
    )?;

    let paths = write_all(&cfg.output_dir, &scored, &vix, &spx, &market)?;
    for p in paths {
        info!("wrote {}", p.display());
    }
    Ok(())
}
