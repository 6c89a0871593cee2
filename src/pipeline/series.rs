use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::types::{FinancialSeries, MarketRow};

/// Gives each series its own close column so the two can sit side by side.
pub fn rename_fin_columns(
    vix: FinancialSeries,
    spx: FinancialSeries,
) -> (FinancialSeries, FinancialSeries) {
    (vix.renamed(), spx.renamed())
}

/// Inner join of VIX and SPX closes on date, in date order.
pub fn join_series(vix: &FinancialSeries, spx: &FinancialSeries) -> Vec<MarketRow> {
    let spx_by_date: HashMap<NaiveDate, f64> =
        spx.points.iter().map(|p| (p.date, p.close)).collect();

    let rows: Vec<MarketRow> = vix
        .points
        .iter()
        .filter_map(|v| {
            spx_by_date.get(&v.date).map(|&spx_close| MarketRow {
                date: v.date,
                vix_close: v.close,
                spx_close,
            })
        })
        .collect();

    debug!(
        vix = vix.points.len(),
        spx = spx.points.len(),
        joined = rows.len(),
        "market join"
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PricePoint, SeriesKind};

    fn series(kind: SeriesKind, points: &[(&str, f64)]) -> FinancialSeries {
        FinancialSeries::new(
            kind,
            points
                .iter()
                .map(|(d, close)| PricePoint {
                    date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
                    close: *close,
                })
                .collect(),
        )
    }

    #[test]
    fn rename_applies_to_both() {
        let (vix, spx) = rename_fin_columns(
            series(SeriesKind::Vix, &[("2020-01-02", 12.5)]),
            series(SeriesKind::Spx, &[("2020-01-02", 3257.85)]),
        );
        assert_eq!(vix.column, "vix_close");
        assert_eq!(spx.column, "spx_close");
        assert_eq!(vix.points[0].close, 12.5);
    }

    #[test]
    fn join_keeps_only_shared_dates_in_order() {
        let vix = series(
            SeriesKind::Vix,
            &[("2020-01-06", 13.9), ("2020-01-02", 12.5), ("2020-01-03", 14.0)],
        );
        let spx = series(
            SeriesKind::Spx,
            &[("2020-01-02", 3257.85), ("2020-01-06", 3246.28), ("2020-01-07", 3237.18)],
        );
        let rows = join_series(&vix, &spx);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date.to_string(), "2020-01-02");
        assert_eq!(rows[0].spx_close, 3257.85);
        assert_eq!(rows[1].date.to_string(), "2020-01-06");
        assert_eq!(rows[1].vix_close, 13.9);
    }
}
