use crate::error::SessionError;
use crate::layout::Layout;
use crate::loader::{self, LoadReport};
use crate::types::Dataset;
use std::path::{Path, PathBuf};
use tracing::info;

/// The loaded sheet and where it came from. Passed explicitly to every
/// operation; a new load replaces it, `reset` empties it.
#[derive(Debug, Default)]
pub struct Session {
    source: Option<PathBuf>,
    data: Option<Dataset>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` with `layout`. On failure the previous data is kept.
    pub fn load(&mut self, path: &Path, layout: &Layout) -> Result<&LoadReport, SessionError> {
        let dataset = loader::load_and_clean(path, layout)?;
        self.source = Some(path.to_path_buf());
        let dataset = self.data.insert(dataset);
        Ok(&dataset.report)
    }

    /// Install an already-built dataset, e.g. one assembled in memory.
    pub fn install(&mut self, source: PathBuf, dataset: Dataset) {
        self.source = Some(source);
        self.data = Some(dataset);
    }

    pub fn reset(&mut self) {
        if self.data.is_some() {
            info!("session reset");
        }
        self.source = None;
        self.data = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn dataset(&self) -> Result<&Dataset, SessionError> {
        self.data.as_ref().ok_or(SessionError::NoData)
    }

    pub fn source(&self) -> Result<&Path, SessionError> {
        self.source.as_deref().ok_or(SessionError::NoSource)
    }
}
