//! Static analysis over the step tree and the path expressions it carries.
//!
//! - [`usage`]: which pipeline elements are read or written
//! - [`references`]: which external artifacts the service depends on
//! - [`resolve`]: what a link or drop end points at in its scope

pub mod references;
pub mod resolve;
pub mod usage;

pub use references::{compute_references, rename_reference};
pub use resolve::{
    Dangling, LinkEnd, Resolution, Resolver, find_dangling_links, local_variables,
    remove_dangling,
};
pub use usage::{find_unused_pipeline_elements, remove_unused_elements};
