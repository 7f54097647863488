use crate::dashboard::DashboardView;
use crate::error::ExportError;
use crate::loader::LoadReport;
use crate::types::{ChartBar, ChartRow, KpiLine, KpiRow, RankingRow};
use crate::util::{format_int, format_number};
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn kpi_rows(lines: &[KpiLine]) -> Vec<KpiRow> {
    lines
        .iter()
        .map(|l| KpiRow {
            code: l.record.code.clone(),
            category: l.record.category.clone().unwrap_or_default(),
            description: l.record.description.clone().unwrap_or_default(),
            sale_price: format_number(l.record.sale_price, 2),
            quantity: format_number(l.record.quantity, 2),
            total_service_cost: format_number(l.kpis.total_service_cost, 2),
            service_margin: format_number(l.kpis.service_margin, 2),
            total_revenue: format_number(l.kpis.total_revenue, 2),
            total_cost: format_number(l.kpis.total_cost, 2),
            total_margin: format_number(l.kpis.total_margin, 2),
        })
        .collect()
}

pub fn ranking_rows(lines: &[KpiLine]) -> Vec<RankingRow> {
    lines
        .iter()
        .enumerate()
        .map(|(idx, l)| RankingRow {
            rank: idx + 1,
            code: l.record.code.clone(),
            description: l.record.description.clone().unwrap_or_default(),
            total_revenue: format_number(l.kpis.total_revenue, 2),
            total_cost: format_number(l.kpis.total_cost, 2),
            total_margin: format_number(l.kpis.total_margin, 2),
        })
        .collect()
}

pub fn chart_rows(bars: &[ChartBar]) -> Vec<ChartRow> {
    bars.iter()
        .map(|b| ChartRow {
            label: b.label.clone(),
            revenue: format_number(b.revenue, 2),
            cost: format_number(b.cost, 2),
            margin: format_number(b.margin, 2),
        })
        .collect()
}

pub fn render_table<T>(rows: &[T]) -> String
where
    T: Tabled + Clone,
{
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(rows.to_vec()).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    println!("{}\n", render_table(&slice));
}

pub fn print_load_report(report: &LoadReport) {
    println!(
        "Processing dataset... ({} rows read, {} kept)",
        format_int(report.total_rows),
        format_int(report.kept_rows)
    );
    if report.dropped_missing_code > 0 {
        println!(
            "Note: {} rows skipped because the code column is empty.",
            format_int(report.dropped_missing_code)
        );
    }
    if report.coerced_values > 0 {
        println!(
            "Warning: {} blank or non-numeric values were replaced with 0:",
            format_int(report.coerced_values)
        );
        for (column, count) in &report.coerced_by_column {
            println!("  - {}: {}", column, format_int(*count));
        }
    }
    println!();
}

/// Print the whole dashboard: metrics, rankings, best seller and chart data.
pub fn print_dashboard(view: &DashboardView, max_rows: usize) {
    println!(
        "Dashboard ({} layout, {} of {} records)\n",
        view.layout,
        format_int(view.report.lines.len()),
        format_int(view.total_records)
    );
    println!("{}\n", render_table(&view.metrics()));

    for w in &view.warnings {
        println!("Warning: {}\n", w);
    }
    if view.is_empty() {
        return;
    }

    println!("Top {} by Revenue", view.report.top_revenue.len());
    preview_table_rows(&ranking_rows(&view.report.top_revenue), max_rows);
    println!("Top {} by Margin", view.report.top_margin.len());
    preview_table_rows(&ranking_rows(&view.report.top_margin), max_rows);

    if let Some(best) = &view.best_seller {
        println!("Best-selling service: {}", best.description);
        println!(
            "  Revenue {} | Cost {} | Margin {}\n",
            format_number(best.revenue, 2),
            format_number(best.cost, 2),
            format_number(best.margin, 2)
        );
    }

    match &view.chart {
        Some(Ok(bars)) => {
            println!("Revenue, Cost and Margin by Description");
            println!("{}\n", render_table(&chart_rows(bars)));
        }
        Some(Err(e)) => eprintln!("Error: {}\n", e),
        None => {}
    }
}
