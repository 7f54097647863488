use crate::types::{KpiLine, KpiReport, Kpis, Record, Totals};
use std::cmp::Ordering;

pub const DEFAULT_TOP_N: usize = 3;

pub fn line_kpis(r: &Record) -> Kpis {
    let total_service_cost = r.staff_cost + r.consumables_cost + r.rental_amortization;
    let service_margin = r.sale_price - total_service_cost;
    Kpis {
        total_service_cost,
        service_margin,
        total_revenue: r.sale_price * r.quantity,
        total_cost: total_service_cost * r.quantity,
        total_margin: service_margin * r.quantity,
    }
}

/// Augment every record with its KPIs, sum the totals and rank the lines.
///
/// The input is never modified; the report owns fresh copies of the records.
pub fn compute(records: &[Record], top_n: usize) -> KpiReport {
    let lines: Vec<KpiLine> = records
        .iter()
        .map(|r| KpiLine {
            record: r.clone(),
            kpis: line_kpis(r),
        })
        .collect();
    let totals = totals(&lines);
    let top_revenue = top_by(&lines, top_n, |k| k.total_revenue);
    let top_margin = top_by(&lines, top_n, |k| k.total_margin);
    KpiReport {
        lines,
        totals,
        top_revenue,
        top_margin,
    }
}

pub fn totals(lines: &[KpiLine]) -> Totals {
    lines.iter().fold(Totals::default(), |mut acc, l| {
        acc.revenue += l.kpis.total_revenue;
        acc.cost += l.kpis.total_cost;
        acc.margin += l.kpis.total_margin;
        acc
    })
}

/// The `n` lines with the largest metric, descending. Ties keep input order.
pub fn top_by<F>(lines: &[KpiLine], n: usize, metric: F) -> Vec<KpiLine>
where
    F: Fn(&Kpis) -> f64,
{
    let mut ranked: Vec<&KpiLine> = lines.iter().collect();
    // `sort_by` is stable, so equal values stay in their original order.
    ranked.sort_by(|a, b| {
        metric(&b.kpis)
            .partial_cmp(&metric(&a.kpis))
            .unwrap_or(Ordering::Equal)
    });
    ranked.into_iter().take(n).cloned().collect()
}
