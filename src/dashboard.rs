// Dashboard composition: filter the session data, compute KPIs and collect
// everything the presentation layer shows. Nothing here prints.
use crate::error::{ChartError, SessionError};
use crate::filter::{self, FilterSelection, ALL};
use crate::kpi;
use crate::layout::Layout;
use crate::session::Session;
use crate::types::{ChartBar, Dataset, KpiLine, KpiReport, MetricRow, SummaryStats};
use crate::util::format_number;
use tracing::debug;

/// Columns the revenue/cost/margin chart needs from the layout.
const CHART_COLUMNS: [&str; 1] = ["description"];

#[derive(Debug, Clone, PartialEq)]
pub struct BestSeller {
    pub description: String,
    pub revenue: f64,
    pub cost: f64,
    pub margin: f64,
}

#[derive(Debug, Clone)]
pub struct DashboardView {
    pub layout: String,
    pub total_records: usize,
    pub report: KpiReport,
    pub best_seller: Option<BestSeller>,
    /// `None` when there is nothing to draw.
    pub chart: Option<Result<Vec<ChartBar>, ChartError>>,
    pub warnings: Vec<String>,
}

impl DashboardView {
    pub fn is_empty(&self) -> bool {
        self.report.lines.is_empty()
    }

    /// Headline figures, rounded to whole units with thousands separators.
    pub fn metrics(&self) -> Vec<MetricRow> {
        let t = self.report.totals;
        [
            ("Total Revenue", t.revenue),
            ("Total Cost", t.cost),
            ("Total Margin", t.margin),
        ]
        .into_iter()
        .map(|(metric, value)| MetricRow {
            metric: metric.to_string(),
            value: format_number(value, 0),
        })
        .collect()
    }

    pub fn summary(&self, dataset: &Dataset, source: Option<String>) -> SummaryStats {
        let codes = |lines: &[KpiLine]| -> Vec<String> {
            lines.iter().map(|l| l.record.code.clone()).collect()
        };
        SummaryStats {
            layout: self.layout.clone(),
            source,
            total_records: self.total_records,
            filtered_records: self.report.lines.len(),
            total_revenue: self.report.totals.revenue,
            total_cost: self.report.totals.cost,
            total_margin: self.report.totals.margin,
            top_revenue: codes(&self.report.top_revenue),
            top_margin: codes(&self.report.top_margin),
            load: dataset.report.clone(),
        }
    }
}

/// Dashboard for the data held by `session`. Fails before computing
/// anything when no file has been loaded.
pub fn from_session(
    session: &Session,
    selection: &FilterSelection,
    top_n: usize,
) -> Result<DashboardView, SessionError> {
    let dataset = session.dataset()?;
    session.source()?;
    Ok(build(dataset, selection, top_n))
}

pub fn build(dataset: &Dataset, selection: &FilterSelection, top_n: usize) -> DashboardView {
    let subset = filter::apply(&dataset.records, &dataset.layout, selection);
    debug!(
        total = dataset.records.len(),
        filtered = subset.len(),
        "building dashboard"
    );
    let report = kpi::compute(&subset, top_n);

    let mut warnings = Vec::new();
    let (best_seller, chart) = if report.lines.is_empty() {
        warnings.push("No records match the selected filters.".to_string());
        (None, None)
    } else {
        (
            best_seller(&report),
            Some(chart_series(&dataset.layout, &report.lines)),
        )
    };

    DashboardView {
        layout: dataset.layout.name.clone(),
        total_records: dataset.records.len(),
        report,
        best_seller,
        chart,
        warnings,
    }
}

fn best_seller(report: &KpiReport) -> Option<BestSeller> {
    let top = report.top_revenue.first()?;
    Some(BestSeller {
        description: top
            .record
            .description
            .clone()
            .unwrap_or_else(|| top.record.code.clone()),
        revenue: top.kpis.total_revenue,
        cost: top.kpis.total_cost,
        margin: top.kpis.total_margin,
    })
}

/// One bar group per line, labelled by description.
pub fn chart_series(layout: &Layout, lines: &[KpiLine]) -> Result<Vec<ChartBar>, ChartError> {
    let missing: Vec<String> = CHART_COLUMNS
        .iter()
        .filter(|c| !layout.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ChartError::MissingColumns(missing));
    }
    Ok(lines
        .iter()
        .map(|l| ChartBar {
            label: l.record.description.clone().unwrap_or_default(),
            revenue: l.kpis.total_revenue,
            cost: l.kpis.total_cost,
            margin: l.kpis.total_margin,
        })
        .collect())
}

/// Choices for the selector at `level`, [`ALL`] first.
pub fn selector_options(dataset: &Dataset, selection: &FilterSelection, level: usize) -> Vec<String> {
    std::iter::once(ALL.to_string())
        .chain(filter::options(
            &dataset.records,
            &dataset.layout,
            selection,
            level,
        ))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{builtin, ColumnSpec};
    use crate::loader::LoadReport;
    use crate::types::Record;
    use std::path::PathBuf;

    fn record(code: &str, category: &str, description: &str, price: f64, qty: f64, staff: f64) -> Record {
        Record {
            code: code.to_string(),
            category: Some(category.to_string()),
            description: Some(description.to_string()),
            sale_price: price,
            quantity: qty,
            staff_cost: staff,
            ..Record::default()
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            layout: builtin("services").unwrap(),
            records: vec![
                record("S1", "Viso", "Pulizia", 100.0, 2.0, 20.0),
                record("S2", "Viso", "Peeling", 50.0, 1.0, 5.0),
                record("S3", "Corpo", "Massaggio", 80.0, 4.0, 30.0),
                record("S4", "Corpo", "Scrub", 40.0, 1.0, 10.0),
            ],
            report: LoadReport::default(),
        }
    }

    #[test]
    fn unfiltered_dashboard_covers_every_record() {
        let data = dataset();
        let view = build(&data, &FilterSelection::default(), 3);

        assert_eq!(view.report.lines.len(), 4);
        assert_eq!(view.report.totals.revenue, 200.0 + 50.0 + 320.0 + 40.0);
        assert!(view.warnings.is_empty());

        let best = view.best_seller.expect("best seller should exist");
        assert_eq!(best.description, "Massaggio");
        assert_eq!(best.revenue, 320.0);
        assert_eq!(best.cost, 120.0);
        assert_eq!(best.margin, 200.0);

        let chart = view.chart.expect("chart should be built").expect("chart columns present");
        assert_eq!(chart.len(), 4);
        assert_eq!(chart[0].label, "Pulizia");
    }

    #[test]
    fn filtered_rankings_come_from_the_subset_only() {
        let data = dataset();
        let selection = FilterSelection::default().with("category", "Viso");
        let view = build(&data, &selection, 3);

        assert_eq!(view.report.lines.len(), 2);
        assert_eq!(view.report.totals.revenue, 250.0);
        assert!(view
            .report
            .top_revenue
            .iter()
            .chain(&view.report.top_margin)
            .all(|l| l.record.category.as_deref() == Some("Viso")));
    }

    #[test]
    fn empty_subset_warns_and_skips_chart_and_ranking() {
        let data = dataset();
        let selection = FilterSelection::default().with("category", "Capelli");
        let view = build(&data, &selection, 3);

        assert!(view.is_empty());
        assert_eq!(view.warnings.len(), 1);
        assert!(view.best_seller.is_none());
        assert!(view.chart.is_none());
        assert_eq!(view.metrics()[0].value, "0");
    }

    #[test]
    fn chart_requires_description_column() {
        let mut layout = builtin("services").unwrap();
        layout.columns.retain(|c: &ColumnSpec| c.name != "description");
        layout.filters.retain(|f| f != "description");

        let err = chart_series(&layout, &[]).unwrap_err();
        assert_eq!(err, ChartError::MissingColumns(vec!["description".to_string()]));
    }

    #[test]
    fn metrics_are_formatted_without_decimals() {
        let data = dataset();
        let view = build(&data, &FilterSelection::default(), 3);
        let metrics = view.metrics();
        assert_eq!(metrics[0].metric, "Total Revenue");
        assert_eq!(metrics[0].value, "610");
        assert_eq!(metrics[1].value, "175");
        assert_eq!(metrics[2].value, "435");
    }

    #[test]
    fn selector_options_start_with_all() {
        let data = dataset();
        let opts = selector_options(&data, &FilterSelection::default(), 0);
        assert_eq!(opts, vec![ALL, "Viso", "Corpo"]);
    }

    #[test]
    fn session_without_data_is_an_error() {
        let session = Session::new();
        let err = from_session(&session, &FilterSelection::default(), 3).unwrap_err();
        assert!(matches!(err, SessionError::NoData));

        let mut loaded = Session::new();
        loaded.install(PathBuf::from("memory.csv"), dataset());
        assert!(from_session(&loaded, &FilterSelection::default(), 3).is_ok());
    }

    #[test]
    fn summary_lists_ranked_codes() {
        let data = dataset();
        let view = build(&data, &FilterSelection::default(), 2);
        let summary = view.summary(&data, Some("memory.csv".to_string()));
        assert_eq!(summary.filtered_records, 4);
        assert_eq!(summary.top_revenue, vec!["S3", "S1"]);
        assert_eq!(summary.top_margin, vec!["S3", "S1"]);
    }
}
