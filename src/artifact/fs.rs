use super::repository::{Artifact, Repository, ServiceSignature};
use crate::config::EditorConfig;
use crate::model::{Element, Pipeline};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File holding a shared type definition: a JSON array of elements.
pub const TYPE_FILE: &str = "type.json";

/// A repository laid out on disk, one directory per artifact: the id
/// `orders.api.submit` lives in `<root>/orders/api/submit`.
///
/// A directory with a step document is a service, one with only a pipeline
/// is an interface, and one with a `type.json` is a shared type.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: PathBuf,
    service_file: String,
    pipeline_file: String,
    targets: Vec<String>,
    runner: Option<String>,
}

impl DirectoryRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let config = EditorConfig::default();
        Self {
            root: root.into(),
            service_file: config.service_file,
            pipeline_file: config.pipeline_file,
            targets: Vec::new(),
            runner: None,
        }
    }

    /// Uses the file names of `config` instead of the defaults.
    pub fn with_config(mut self, config: &EditorConfig) -> Self {
        self.service_file = config.service_file.clone();
        self.pipeline_file = config.pipeline_file.clone();
        self
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_runner(mut self, runner: impl Into<String>) -> Self {
        self.runner = Some(runner.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The entry directory of `id`.
    pub fn entry_path(&self, id: &str) -> PathBuf {
        id.split('.')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// The id of an entry directory below the root, the inverse of
    /// [`entry_path`](Self::entry_path).
    pub fn entry_id(&self, entry: &Path) -> Option<String> {
        let relative = entry.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        (!parts.is_empty()).then(|| parts.join("."))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(error) => {
                debug!(path = %path.display(), %error, "artifact file not readable");
                return None;
            }
        };
        match serde_json::from_slice(&content) {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(path = %path.display(), %error, "artifact file not parseable");
                None
            }
        }
    }
}

impl Repository for DirectoryRepository {
    fn resolve(&self, id: &str) -> Option<Artifact> {
        let entry = self.entry_path(id);
        let type_path = entry.join(TYPE_FILE);
        if type_path.is_file() {
            return Self::read_json::<Vec<Element>>(&type_path).map(Artifact::Type);
        }

        let pipeline: Pipeline = Self::read_json(&entry.join(&self.pipeline_file))?;
        let signature = ServiceSignature::from_pipeline(&pipeline);
        if entry.join(&self.service_file).is_file() {
            Some(Artifact::Service(signature))
        } else {
            Some(Artifact::Interface(signature))
        }
    }

    fn service_runner(&self) -> Option<String> {
        self.runner.clone()
    }

    fn execution_targets(&self) -> Vec<String> {
        self.targets.clone()
    }
}
