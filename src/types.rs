use crate::layout::{Layout, NumericField};
use crate::loader::LoadReport;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

/// One cleaned row of the source sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub code: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub cost_distribution: f64,
    pub sale_price: f64,
    pub labor_hours: f64,
    pub staff_cost: f64,
    pub consumables_cost: f64,
    pub rental_amortization: f64,
    pub quantity: f64,
    /// Mapped text columns without a dedicated field, keyed by layout name.
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    /// Text value of a named column. Blank cells are `None`.
    pub fn text(&self, field: &str) -> Option<&str> {
        match field {
            "code" => Some(self.code.as_str()),
            "category" => self.category.as_deref(),
            "description" => self.description.as_deref(),
            other => self.attributes.get(other).map(String::as_str),
        }
    }

    pub fn set_numeric(&mut self, field: NumericField, value: f64) {
        let slot = match field {
            NumericField::CostDistribution => &mut self.cost_distribution,
            NumericField::SalePrice => &mut self.sale_price,
            NumericField::LaborHours => &mut self.labor_hours,
            NumericField::StaffCost => &mut self.staff_cost,
            NumericField::ConsumablesCost => &mut self.consumables_cost,
            NumericField::RentalAmortization => &mut self.rental_amortization,
            NumericField::Quantity => &mut self.quantity,
        };
        *slot = value;
    }
}

/// A loaded sheet: the layout it was read with and its surviving records.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub layout: Layout,
    pub records: Vec<Record>,
    pub report: LoadReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub total_service_cost: f64,
    pub service_margin: f64,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub total_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiLine {
    pub record: Record,
    pub kpis: Kpis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub revenue: f64,
    pub cost: f64,
    pub margin: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiReport {
    pub lines: Vec<KpiLine>,
    pub totals: Totals,
    pub top_revenue: Vec<KpiLine>,
    pub top_margin: Vec<KpiLine>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiRow {
    #[serde(rename = "Code")]
    #[tabled(rename = "Code")]
    pub code: String,
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Description")]
    #[tabled(rename = "Description")]
    pub description: String,
    #[serde(rename = "SalePrice")]
    #[tabled(rename = "SalePrice")]
    pub sale_price: String,
    #[serde(rename = "Quantity")]
    #[tabled(rename = "Quantity")]
    pub quantity: String,
    #[serde(rename = "ServiceCost")]
    #[tabled(rename = "ServiceCost")]
    pub total_service_cost: String,
    #[serde(rename = "ServiceMargin")]
    #[tabled(rename = "ServiceMargin")]
    pub service_margin: String,
    #[serde(rename = "TotalRevenue")]
    #[tabled(rename = "TotalRevenue")]
    pub total_revenue: String,
    #[serde(rename = "TotalCost")]
    #[tabled(rename = "TotalCost")]
    pub total_cost: String,
    #[serde(rename = "TotalMargin")]
    #[tabled(rename = "TotalMargin")]
    pub total_margin: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Code")]
    #[tabled(rename = "Code")]
    pub code: String,
    #[serde(rename = "Description")]
    #[tabled(rename = "Description")]
    pub description: String,
    #[serde(rename = "TotalRevenue")]
    #[tabled(rename = "TotalRevenue")]
    pub total_revenue: String,
    #[serde(rename = "TotalCost")]
    #[tabled(rename = "TotalCost")]
    pub total_cost: String,
    #[serde(rename = "TotalMargin")]
    #[tabled(rename = "TotalMargin")]
    pub total_margin: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct MetricRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// One bar group of the revenue/cost/margin chart.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ChartBar {
    pub label: String,
    pub revenue: f64,
    pub cost: f64,
    pub margin: f64,
}

#[derive(Debug, Tabled, Clone)]
pub struct ChartRow {
    #[tabled(rename = "Description")]
    pub label: String,
    #[tabled(rename = "Revenue")]
    pub revenue: String,
    #[tabled(rename = "Cost")]
    pub cost: String,
    #[tabled(rename = "Margin")]
    pub margin: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub layout: String,
    pub source: Option<String>,
    pub total_records: usize,
    pub filtered_records: usize,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub total_margin: f64,
    pub top_revenue: Vec<String>,
    pub top_margin: Vec<String>,
    pub load: LoadReport,
}
