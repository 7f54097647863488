// Error types for every stage of the pipeline.
//
// Each stage gets its own enum so callers can tell a bad layout apart from a
// bad file; `main` wraps them all in `anyhow` for reporting.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Invalid column reference '{0}' (expected letters such as A, J or AA)")]
    InvalidColumn(String),

    #[error("Layout '{0}' does not map the required 'code' column")]
    MissingCode(String),

    #[error("Layout '{layout}' maps '{name}' more than once")]
    DuplicateName { layout: String, name: String },

    #[error("Layout '{layout}' filters on '{field}', which is not a mapped column")]
    UnknownFilterField { layout: String, field: String },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("The workbook has no sheets")]
    EmptyWorkbook,

    #[error("The file has no header row")]
    MissingHeader,

    #[error("Column {column} is required by the layout but the file only has {width} columns")]
    MissingColumn { column: String, width: usize },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Workbook(#[from] calamine::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No data available. Load a file first.")]
    NoData,

    #[error("No source file recorded for the loaded data.")]
    NoSource,

    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("The data does not contain the columns required by the chart: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Unknown layout '{0}'")]
    UnknownLayout(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}
