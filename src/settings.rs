// Application settings: `service_kpi.toml` (optional) overlaid with
// `SERVICE_KPI__*` environment variables.
use crate::error::ConfigError;
use crate::kpi::DEFAULT_TOP_N;
use crate::layout::{self, Layout};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "service_kpi.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub kpi_csv: PathBuf,
    pub summary_json: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            kpi_csv: PathBuf::from("kpi_lines.csv"),
            summary_json: PathBuf::from("kpi_summary.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Name of the layout to read files with.
    pub layout: String,
    pub top_n: usize,
    /// Used when `RUST_LOG` is not set.
    pub log_level: String,
    pub output: OutputConfig,
    /// Extra layouts, keyed by name. A name shared with a built-in layout
    /// replaces it.
    pub layouts: BTreeMap<String, Layout>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            layout: "services".to_string(),
            top_n: DEFAULT_TOP_N,
            log_level: "warn".to_string(),
            output: OutputConfig::default(),
            layouts: BTreeMap::new(),
        }
    }
}

/// Load settings from `path` (missing file is fine) and the environment.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("SERVICE_KPI")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::ValidationError(
                "top_n must be at least 1".to_string(),
            ));
        }
        for (name, layout) in &self.layouts {
            self.named(name, layout).validate()?;
        }
        self.active_layout().map(|_| ())
    }

    /// The layout selected by `self.layout`.
    pub fn active_layout(&self) -> Result<Layout, ConfigError> {
        self.layout_by_name(&self.layout)
    }

    pub fn layout_by_name(&self, name: &str) -> Result<Layout, ConfigError> {
        let layout = match self.layouts.get(name) {
            Some(custom) => self.named(name, custom),
            None => layout::builtin(name).ok_or_else(|| ConfigError::UnknownLayout(name.to_string()))?,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn layout_names(&self) -> Vec<String> {
        let mut names: Vec<String> = layout::builtin_names().into_iter().map(str::to_string).collect();
        for name in self.layouts.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn named(&self, name: &str, layout: &Layout) -> Layout {
        let mut layout = layout.clone();
        layout.name = name.to_string();
        layout
    }
}
