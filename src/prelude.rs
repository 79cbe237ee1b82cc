//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and functions from the vmflow crate.
//! Import this module to get access to the core functionality without having to import
//! each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use vmflow::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let repository = DirectoryRepository::new("path/to/repository");
//! let manager = ArtifactManager::new(repository, EditorConfig::default());
//!
//! let mut service = manager.load("path/to/repository/orders/submit")?;
//! println!("Unused: {:?}", find_unused_pipeline_elements(&service));
//!
//! for message in manager.save("path/to/repository/orders/submit", &mut service)? {
//!     println!("{}", message);
//! }
//! # Ok(())
//! # }
//! ```

// Entity model
pub use crate::model::{
    Element, ElementRef, NodeId, Pipeline, Step, StepGraph, StepKind, StepTree, StepType,
    VmService,
};

// Path expressions
pub use crate::path::{ParsedPath, PathIndex};

// Analysis and ordering
pub use crate::analysis::{
    compute_references, find_dangling_links, find_unused_pipeline_elements,
    remove_unused_elements, rename_reference,
};
pub use crate::order::{execution_plan, recompute};

// Persistence
pub use crate::persist::{deserialize, normalize, serialize, serialize_pretty};

// Validation
pub use crate::validation::{MessageKind, Severity, ValidationMessage, Validator, validate};

// Repository boundary
pub use crate::artifact::{
    Artifact, ArtifactManager, DirectoryRepository, MemoryRepository, NoRepository, Repository,
    ServiceSignature,
};
pub use crate::config::EditorConfig;

// Error types
pub use crate::error::{ArtifactError, LinkError, PathParseError, PersistError, StepRejected};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
