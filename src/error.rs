use std::path::PathBuf;
use thiserror::Error;

/// A path or query expression that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot parse '{text}' at position {position}: {reason}")]
pub struct PathParseError {
    pub text: String,
    pub position: usize,
    pub reason: String,
}

impl PathParseError {
    pub(crate) fn new(text: &str, position: usize, reason: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            position,
            reason: reason.into(),
        }
    }
}

/// A mutation refused because the parent does not accept that kind of child.
///
/// This is returned rather than raised so the caller decides how to react.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepRejected {
    #[error("A '{parent}' step cannot contain a '{child}' step")]
    IllegalChild { parent: String, child: String },

    #[error("Step '{0}' is the root and cannot be moved or removed")]
    Root(String),

    #[error("Step '{0}' cannot be moved into its own subtree")]
    IntoOwnSubtree(String),

    #[error("Node {0} does not exist in this graph")]
    MissingNode(usize),
}

/// Errors raised while drawing a link between two paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error(transparent)]
    Parse(#[from] PathParseError),

    #[error(transparent)]
    Rejected(#[from] StepRejected),

    #[error("Path '{path}' does not resolve in the scope of step '{step_id}'")]
    Unresolved { path: String, step_id: String },

    #[error("Step '{0}' is neither a map nor an invoke and cannot hold links")]
    NotAScope(String),
}

/// Errors raised while reading or writing the persisted step tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Unknown step tag '{0}'")]
    UnknownStep(String),

    #[error("Invalid value '{value}' for attribute '{attribute}' on '{tag}'")]
    InvalidAttribute {
        tag: String,
        attribute: String,
        value: String,
    },

    #[error("Invalid document structure: {0}")]
    Structure(String),

    #[error("Document is not valid UTF-8: {0}")]
    Utf8(String),
}

/// Errors raised while loading the editor configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors surfaced to the hosting repository by the artifact manager.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("I/O failure on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not process step document '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: PersistError,
    },

    #[error("Invalid pipeline definition '{path}': {source}")]
    Pipeline {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
