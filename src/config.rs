use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Editor-wide switches, passed explicitly to the components that read them.
///
/// Every field has a default, so a configuration file only needs to list the
/// values it changes:
///
/// ```json
/// { "showHiddenDrops": true, "autoRemoveDanglingLinks": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Show drops that only discard a sibling invoke's result.
    pub show_hidden_drops: bool,
    /// Remove links that no longer resolve when a service is loaded.
    pub auto_remove_dangling_links: bool,
    pub renumber_on_save: bool,
    /// Write the normalized (default-free) XML form on save.
    pub prettify_on_save: bool,
    /// Report links whose ends use a runtime-evaluated index.
    pub report_index_queries: bool,
    pub service_file: String,
    pub pipeline_file: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            show_hidden_drops: false,
            auto_remove_dangling_links: false,
            renumber_on_save: true,
            prettify_on_save: true,
            report_index_queries: true,
            service_file: "service.xml".to_string(),
            pipeline_file: "pipeline.json".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_hidden_drops(mut self, show: bool) -> Self {
        self.show_hidden_drops = show;
        self
    }

    pub fn with_dangling_link_removal(mut self, remove: bool) -> Self {
        self.auto_remove_dangling_links = remove;
        self
    }

    pub fn with_renumber_on_save(mut self, renumber: bool) -> Self {
        self.renumber_on_save = renumber;
        self
    }

    pub fn with_prettify_on_save(mut self, prettify: bool) -> Self {
        self.prettify_on_save = prettify;
        self
    }

    pub fn with_index_query_reports(mut self, report: bool) -> Self {
        self.report_index_queries = report;
        self
    }

    pub fn with_file_names(mut self, service_file: &str, pipeline_file: &str) -> Self {
        self.service_file = service_file.to_string();
        self.pipeline_file = pipeline_file.to_string();
        self
    }
}
