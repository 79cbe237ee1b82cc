//! The persisted XML form of a step tree.
//!
//! One element per step, named after its type (`<invoke>`, `<link>`, ...),
//! with the step's fields as attributes. A catch lists its exception types as
//! `<types>` child elements ahead of its steps. Documents written by older
//! tools use `<steps xsi:type="...Invoke">` instead of dedicated tags; both
//! forms read into the same graph.

mod normalize;
mod reader;
mod writer;

pub use normalize::{normalize, patch_service_ids};
pub use reader::deserialize;
pub use writer::serialize;

use crate::error::PersistError;
use crate::model::StepGraph;

/// [`serialize`] followed by [`normalize`].
pub fn serialize_pretty(graph: &StepGraph) -> Result<Vec<u8>, PersistError> {
    let raw = serialize(graph)?;
    let text = String::from_utf8(raw).map_err(|e| PersistError::Utf8(e.to_string()))?;
    Ok(normalize(&text)?.into_bytes())
}
