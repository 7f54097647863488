// Column layouts: which spreadsheet column holds which field, and how the
// dashboard filters are arranged.
//
// The two dataset shapes we ship with (the flat "services" sheet and the
// hierarchical "territorial" sheet) are just two values of `Layout`; extra
// layouts can be declared in the configuration file.
use crate::error::LayoutError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Numeric columns. Every one of them is coerced to `f64`, zero when blank
/// or unparsable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumericField {
    CostDistribution,
    SalePrice,
    LaborHours,
    StaffCost,
    ConsumablesCost,
    RentalAmortization,
    Quantity,
}

impl NumericField {
    pub const ALL: [NumericField; 7] = [
        NumericField::CostDistribution,
        NumericField::SalePrice,
        NumericField::LaborHours,
        NumericField::StaffCost,
        NumericField::ConsumablesCost,
        NumericField::RentalAmortization,
        NumericField::Quantity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NumericField::CostDistribution => "cost_distribution",
            NumericField::SalePrice => "sale_price",
            NumericField::LaborHours => "labor_hours",
            NumericField::StaffCost => "staff_cost",
            NumericField::ConsumablesCost => "consumables_cost",
            NumericField::RentalAmortization => "rental_amortization",
            NumericField::Quantity => "quantity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// What a mapped column turns into on a `Record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Code,
    Category,
    Description,
    Numeric(NumericField),
    /// Any other text column, kept by name (region, province, dates, ...).
    Attribute,
}

impl Field {
    pub fn from_name(name: &str) -> Self {
        match name {
            "code" => Field::Code,
            "category" => Field::Category,
            "description" => Field::Description,
            other => NumericField::from_name(other)
                .map(Field::Numeric)
                .unwrap_or(Field::Attribute),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Spreadsheet column letter(s), e.g. `A` or `L`.
    pub column: String,
    pub name: String,
}

/// A column that has been checked and turned into a zero-based index.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub index: usize,
    pub letter: String,
    pub name: String,
    pub field: Field,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    /// Selector fields, outermost first.
    #[serde(default)]
    pub filters: Vec<String>,
    /// When true each selector's options are narrowed by the selections
    /// above it; otherwise every selector lists the whole table.
    #[serde(default)]
    pub cascading: bool,
    /// Enables the date-range filter on the first column named like "date".
    #[serde(default)]
    pub date_filter: bool,
}

fn spec(column: &str, name: &str) -> ColumnSpec {
    ColumnSpec {
        column: column.to_string(),
        name: name.to_string(),
    }
}

static BUILTIN_LAYOUTS: Lazy<BTreeMap<&'static str, Layout>> = Lazy::new(|| {
    let services = Layout {
        name: "services".to_string(),
        columns: vec![
            spec("A", "code"),
            spec("B", "category"),
            spec("C", "description"),
            spec("D", "cost_distribution"),
            spec("E", "sale_price"),
            spec("F", "labor_hours"),
            spec("G", "staff_cost"),
            spec("H", "consumables_cost"),
            spec("I", "rental_amortization"),
            spec("J", "quantity"),
        ],
        filters: vec!["category".to_string(), "description".to_string()],
        cascading: false,
        date_filter: false,
    };
    let territorial = Layout {
        name: "territorial".to_string(),
        columns: vec![
            spec("A", "code"),
            spec("B", "region"),
            spec("C", "province"),
            spec("D", "commune"),
            spec("E", "service_date"),
            spec("F", "description"),
            spec("G", "sale_price"),
            spec("H", "quantity"),
            spec("L", "staff_cost"),
        ],
        filters: vec![
            "region".to_string(),
            "province".to_string(),
            "commune".to_string(),
        ],
        cascading: true,
        date_filter: true,
    };
    BTreeMap::from([("services", services), ("territorial", territorial)])
});

/// Look up one of the layouts compiled into the binary.
pub fn builtin(name: &str) -> Option<Layout> {
    BUILTIN_LAYOUTS.get(name).cloned()
}

pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN_LAYOUTS.keys().copied().collect()
}

/// Convert a spreadsheet column reference (`A`, `J`, `AA`) to a zero-based
/// index. Lowercase letters are accepted.
pub fn column_index(letters: &str) -> Result<usize, LayoutError> {
    let trimmed = letters.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LayoutError::InvalidColumn(letters.to_string()));
    }
    let mut index = 0usize;
    for c in trimmed.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| LayoutError::InvalidColumn(letters.to_string()))?;
    }
    Ok(index - 1)
}

impl Layout {
    /// Check the layout and resolve its column letters, in declaration order.
    pub fn resolve(&self) -> Result<Vec<ResolvedColumn>, LayoutError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.columns.len());
        for c in &self.columns {
            let name = c.name.trim().to_string();
            if !seen.insert(name.clone()) {
                return Err(LayoutError::DuplicateName {
                    layout: self.name.clone(),
                    name,
                });
            }
            resolved.push(ResolvedColumn {
                index: column_index(&c.column)?,
                letter: c.column.trim().to_ascii_uppercase(),
                field: Field::from_name(&name),
                name,
            });
        }
        if !resolved.iter().any(|c| c.field == Field::Code) {
            return Err(LayoutError::MissingCode(self.name.clone()));
        }
        if let Some(field) = self.filters.iter().find(|f| !seen.contains(f.as_str())) {
            return Err(LayoutError::UnknownFilterField {
                layout: self.name.clone(),
                field: field.clone(),
            });
        }
        Ok(resolved)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        self.resolve().map(|_| ())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.trim() == name)
    }

    /// Mapped and not numeric, so it can be compared against a selected value.
    pub fn is_text_column(&self, name: &str) -> bool {
        self.has_column(name) && !matches!(Field::from_name(name), Field::Numeric(_))
    }

    /// The first mapped column whose name contains "date", if the layout
    /// enables date filtering at all.
    pub fn date_column(&self) -> Option<&str> {
        if !self.date_filter {
            return None;
        }
        self.columns
            .iter()
            .map(|c| c.name.trim())
            .find(|n| n.to_ascii_lowercase().contains("date"))
    }
}
