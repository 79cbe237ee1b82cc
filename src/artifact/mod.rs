//! The boundary to the hosting repository: artifact lookup, and loading and
//! saving services on disk.

pub mod fs;
pub mod manager;
pub mod repository;

pub use fs::DirectoryRepository;
pub use manager::ArtifactManager;
pub use repository::{
    Artifact, Fan, InvokeTarget, MemoryRepository, NoRepository, Repository, ServiceSignature,
};
