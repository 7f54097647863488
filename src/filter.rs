// Selector logic for the dashboard.
//
// A layout lists its selector fields outermost first. In a cascading layout
// (region -> province -> commune) the options offered at each level come
// from the rows matching the selections above it; in a flat layout every
// selector lists the whole table. Filtering always returns fresh copies.
use crate::layout::Layout;
use crate::types::Record;
use crate::util::parse_date_safe;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Label shown for the "no filter" option of every selector.
pub const ALL: &str = "All";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    /// field -> required value. Fields without an entry are not filtered.
    pub choices: BTreeMap<String, String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl FilterSelection {
    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.select(field, value);
        self
    }

    pub fn with_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Record a selector choice. Picking [`ALL`] clears the field.
    pub fn select(&mut self, field: &str, value: &str) {
        if value == ALL {
            self.choices.remove(field);
        } else {
            self.choices.insert(field.to_string(), value.to_string());
        }
    }

    pub fn choice(&self, field: &str) -> Option<&str> {
        self.choices.get(field).map(String::as_str)
    }

    fn has_date_range(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }
}

/// Distinct non-blank values of `field`, in order of first appearance.
pub fn distinct_values(records: &[Record], field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.text(field))
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// Options for the selector at `level` of the layout's filter list, not
/// including the implicit [`ALL`] entry.
pub fn options(records: &[Record], layout: &Layout, selection: &FilterSelection, level: usize) -> Vec<String> {
    let Some(field) = layout.filters.get(level) else {
        return Vec::new();
    };
    if !layout.cascading {
        return distinct_values(records, field);
    }
    let parents = &layout.filters[..level];
    let subset: Vec<Record> = records
        .iter()
        .filter(|r| {
            parents.iter().all(|p| match selection.choice(p) {
                Some(v) => r.text(p) == Some(v),
                None => true,
            })
        })
        .cloned()
        .collect();
    distinct_values(&subset, field)
}

/// Rows matching every selector choice and the date range.
///
/// A value that does not occur in the data simply yields no rows.
pub fn apply(records: &[Record], layout: &Layout, selection: &FilterSelection) -> Vec<Record> {
    let mut out: Vec<Record> = records.to_vec();
    for (field, value) in &selection.choices {
        out.retain(|r| r.text(field) == Some(value.as_str()));
        debug!(field = %field, value = %value, remaining = out.len(), "applied selector");
    }

    if selection.has_date_range() {
        match layout.date_column() {
            Some(column) => {
                out.retain(|r| in_range(parse_date_safe(r.text(column)), selection));
                debug!(column = %column, remaining = out.len(), "applied date range");
            }
            None => warn!(layout = %layout.name, "date range ignored: layout has no date column"),
        }
    }
    out
}

fn in_range(date: Option<NaiveDate>, selection: &FilterSelection) -> bool {
    let Some(d) = date else {
        return false;
    };
    selection.date_from.map_or(true, |from| d >= from) && selection.date_to.map_or(true, |to| d <= to)
}

/// Earliest and latest parseable date in the layout's date column.
pub fn date_bounds(records: &[Record], layout: &Layout) -> Option<(NaiveDate, NaiveDate)> {
    let column = layout.date_column()?;
    let mut dates = records.iter().filter_map(|r| parse_date_safe(r.text(column)));
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}
