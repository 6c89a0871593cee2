use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::types::{FinancialSeries, MarketRow, ScoredPost};

pub const POSTS_FILE: &str = "posts.csv";
pub const MARKET_FILE: &str = "market.csv";

/// `id,user_id,created_at,raw,weighted,normalized,score`.
pub fn write_posts<W: Write>(out: W, posts: &[ScoredPost]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    if posts.is_empty() {
        writer.write_record([
            "id",
            "user_id",
            "created_at",
            "raw",
            "weighted",
            "normalized",
            "score",
        ])?;
    }
    for post in posts {
        writer.serialize(post)?;
    }
    writer.flush()?;
    Ok(())
}

/// `date,<column>` where the column is the series' current label.
pub fn write_series<W: Write>(out: W, series: &FinancialSeries) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["date", series.column.as_str()])?;
    for p in &series.points {
        writer.write_record([p.date.to_string(), p.close.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// `date,vix_close,spx_close`.
pub fn write_market<W: Write>(out: W, rows: &[MarketRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    if rows.is_empty() {
        writer.write_record(["date", "vix_close", "spx_close"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the four output files into `dir`, creating it if needed.
pub fn write_all(
    dir: &Path,
    posts: &[ScoredPost],
    vix: &FinancialSeries,
    spx: &FinancialSeries,
    market: &[MarketRow],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let posts_path = dir.join(POSTS_FILE);
    write_posts(std::fs::File::create(&posts_path)?, posts)?;

    let vix_path = dir.join(format!("{}.csv", vix.kind.table()));
    write_series(std::fs::File::create(&vix_path)?, vix)?;

    let spx_path = dir.join(format!("{}.csv", spx.kind.table()));
    write_series(std::fs::File::create(&spx_path)?, spx)?;

    let market_path = dir.join(MARKET_FILE);
    write_market(std::fs::File::create(&market_path)?, market)?;

    info!(
        dir = %dir.display(),
        posts = posts.len(),
        vix = vix.points.len(),
        spx = spx.points.len(),
        market = market.len(),
        "outputs written"
    );
    Ok(vec![posts_path, vix_path, spx_path, market_path])
}
