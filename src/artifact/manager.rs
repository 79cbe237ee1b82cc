use super::repository::Repository;
use crate::analysis::{compute_references, find_dangling_links, remove_dangling, rename_reference};
use crate::config::EditorConfig;
use crate::error::{ArtifactError, PersistError};
use crate::model::{Pipeline, VmService};
use crate::persist::{deserialize, patch_service_ids, serialize, serialize_pretty};
use crate::validation::{ValidationMessage, Validator};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Loads and saves VM Services stored as entry directories holding a step
/// document and a pipeline definition.
pub struct ArtifactManager<R: Repository> {
    repository: R,
    config: EditorConfig,
}

impl<R: Repository> ArtifactManager<R> {
    pub fn new(repository: R, config: EditorConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    fn service_path(&self, entry: &Path) -> PathBuf {
        entry.join(&self.config.service_file)
    }

    fn pipeline_path(&self, entry: &Path) -> PathBuf {
        entry.join(&self.config.pipeline_file)
    }

    /// Reads the service stored in `entry`. Its id is the directory name.
    ///
    /// With `auto_remove_dangling_links` set, links and drops that no longer
    /// resolve are removed right away.
    pub fn load(&self, entry: impl AsRef<Path>) -> Result<VmService, ArtifactError> {
        let entry = entry.as_ref();
        let service_path = self.service_path(entry);
        let bytes = read(&service_path)?;
        let steps = deserialize(&bytes).map_err(|source| ArtifactError::Persist {
            path: service_path.clone(),
            source,
        })?;

        let pipeline_path = self.pipeline_path(entry);
        let pipeline: Pipeline = serde_json::from_slice(&read(&pipeline_path)?).map_err(|source| {
            ArtifactError::Pipeline {
                path: pipeline_path,
                source,
            }
        })?;

        let id = entry
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut service = VmService::new(id)
            .with_pipeline(pipeline)
            .with_steps(steps);

        if self.config.auto_remove_dangling_links {
            for dangling in find_dangling_links(&service, &self.repository) {
                if remove_dangling(&mut service, &dangling).is_some() {
                    warn!(step = %dangling.step_id, path = %dangling.path, "removed dangling link");
                }
            }
        }

        info!(service = %service.id, steps = service.steps.len(), "loaded service");
        Ok(service)
    }

    /// Validates (repairing duplicate ids), renumbers and writes `service`.
    ///
    /// Validation errors are returned, not enforced: a service under edit can
    /// always be saved. Both files are staged before either is replaced, so
    /// a failed write leaves the entry as it was.
    pub fn save(
        &self,
        entry: impl AsRef<Path>,
        service: &mut VmService,
    ) -> Result<Vec<ValidationMessage>, ArtifactError> {
        let entry = entry.as_ref();
        let messages = Validator::new(&self.config)
            .with_repository(&self.repository)
            .validate(service);
        if self.config.renumber_on_save {
            service.steps.renumber();
        }

        let service_path = self.service_path(entry);
        let document = if self.config.prettify_on_save {
            serialize_pretty(&service.steps)
        } else {
            serialize(&service.steps)
        }
        .map_err(|source| ArtifactError::Persist {
            path: service_path.clone(),
            source,
        })?;

        let pipeline_path = self.pipeline_path(entry);
        let pipeline = serde_json::to_vec_pretty(&service.pipeline).map_err(|source| {
            ArtifactError::Pipeline {
                path: pipeline_path.clone(),
                source,
            }
        })?;

        fs::create_dir_all(entry).map_err(|source| ArtifactError::Io {
            path: entry.to_path_buf(),
            source,
        })?;
        commit(vec![
            stage(&service_path, &document)?,
            stage(&pipeline_path, &pipeline)?,
        ])?;

        info!(
            service = %service.id,
            errors = messages.iter().filter(|m| m.is_error()).count(),
            "saved service"
        );
        Ok(messages)
    }

    /// The external ids the service depends on.
    pub fn get_references(&self, service: &VmService) -> Vec<String> {
        compute_references(service, &self.repository)
    }

    /// Renames a dependency in a loaded service and revalidates it.
    pub fn update_reference(
        &self,
        service: &mut VmService,
        old_id: &str,
        new_id: &str,
    ) -> Vec<ValidationMessage> {
        rename_reference(service, old_id, new_id);
        Validator::new(&self.config)
            .with_repository(&self.repository)
            .validate(service)
    }

    /// Renames a dependency directly in the stored files of `container`,
    /// for entries that cannot be loaded as they are. Returns the number of
    /// references changed; files without a match are left untouched, and
    /// nothing is written unless both files could be patched.
    pub fn update_broken_reference(
        &self,
        container: impl AsRef<Path>,
        old_id: &str,
        new_id: &str,
    ) -> Result<usize, ArtifactError> {
        let container = container.as_ref();
        let service_path = self.service_path(container);
        let raw = read(&service_path)?;
        let text = String::from_utf8(raw).map_err(|e| ArtifactError::Persist {
            path: service_path.clone(),
            source: PersistError::Utf8(e.to_string()),
        })?;
        let (patched, mut count) =
            patch_service_ids(&text, old_id, new_id).map_err(|source| ArtifactError::Persist {
                path: service_path.clone(),
                source,
            })?;
        let mut staged = Vec::new();
        if count > 0 {
            staged.push(stage(&service_path, patched.as_bytes())?);
        }

        let pipeline_path = self.pipeline_path(container);
        if pipeline_path.exists() {
            let mut pipeline: Pipeline =
                serde_json::from_slice(&read(&pipeline_path)?).map_err(|source| {
                    ArtifactError::Pipeline {
                        path: pipeline_path.clone(),
                        source,
                    }
                })?;
            let mut changed = pipeline.rename_type_reference(old_id, new_id);
            if pipeline.interface.as_deref() == Some(old_id) {
                pipeline.interface = Some(new_id.to_string());
                changed += 1;
            }
            if changed > 0 {
                let bytes = serde_json::to_vec_pretty(&pipeline).map_err(|source| {
                    ArtifactError::Pipeline {
                        path: pipeline_path.clone(),
                        source,
                    }
                })?;
                staged.push(stage(&pipeline_path, &bytes)?);
                count += changed;
            }
        }
        commit(staged)?;

        info!(
            container = %container.display(),
            old = old_id,
            new = new_id,
            count,
            "patched stored references"
        );
        Ok(count)
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// New content written to a temporary file next to its destination.
struct Staged {
    file: NamedTempFile,
    path: PathBuf,
}

fn stage(path: &Path, bytes: &[u8]) -> Result<Staged, ArtifactError> {
    let io_error = |source: std::io::Error| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(directory).map_err(io_error)?;
    file.write_all(bytes).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    Ok(Staged {
        file,
        path: path.to_path_buf(),
    })
}

/// Renames every staged file over its destination, back to back. Each
/// rename is atomic; readers see either the old or the new content of a file.
fn commit(staged: Vec<Staged>) -> Result<(), ArtifactError> {
    for Staged { file, path } in staged {
        file.persist(&path).map_err(|e| ArtifactError::Io {
            path: path.clone(),
            source: e.error,
        })?;
    }
    Ok(())
}
