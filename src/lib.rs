//! # vmflow - VM Service Step-Graph Core
//!
//! **vmflow** is the model behind a visual editor for "VM Services": flow-chart
//! programs built from typed steps (sequence, map, for, switch, throw, catch,
//! invoke, link, drop). It owns the step tree, the path expressions embedded in
//! step attributes, and the algorithms that keep both consistent while a user
//! edits them. Rendering and widget plumbing live elsewhere and call into this
//! crate.
//!
//! ## Core Workflow
//!
//! 1.  **Load**: An [`ArtifactManager`](artifact::ArtifactManager) reads a
//!     service's step document (`service.xml`) and pipeline (`pipeline.json`)
//!     from its entry directory.
//! 2.  **Edit**: Steps are added, moved and removed through the
//!     [`StepGraph`](model::StepGraph), which refuses illegal nesting. Links
//!     are drawn through [`VmService::draw_link`](model::VmService::draw_link),
//!     which resolves both ends and keeps invocation order consistent.
//! 3.  **Analyze**: [`analysis`] finds unused pipeline elements, dangling links
//!     and external references; [`order`] checks and recomputes the order of
//!     invokes inside a map.
//! 4.  **Validate & Save**: [`validation`] produces severity-leveled messages
//!     (repairing duplicate ids on the way) and the manager writes the service
//!     back atomically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vmflow::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let repository = MemoryRepository::new().with_service(
//!         "customers.lookup",
//!         ServiceSignature::new(
//!             vec![Element::scalar("name", "string")],
//!             vec![Element::scalar("id", "string")],
//!         ),
//!     );
//!
//!     let pipeline = Pipeline::new(
//!         vec![Element::scalar("name", "string")],
//!         vec![Element::scalar("customerId", "string")],
//!     );
//!     let mut service = VmService::new("orders.submit").with_pipeline(pipeline);
//!
//!     // A map holding one invoke, wired to the pipeline on both sides.
//!     let root = service.steps.root();
//!     let map = service.steps.add_child(root, Step::map())?;
//!     let invoke = service.add_invoke(map, "customers.lookup")?;
//!     service.draw_link(invoke, "input/name", "input/name", &repository)?;
//!
//!     let result = service
//!         .steps
//!         .step(invoke)
//!         .and_then(Step::as_invoke)
//!         .map(|i| i.result_name.clone())
//!         .unwrap_or_default();
//!     service.draw_link(map, &format!("{}/output/id", result), "output/customerId", &repository)?;
//!
//!     let config = EditorConfig::default();
//!     for message in Validator::new(&config).with_repository(&repository).validate(&mut service) {
//!         println!("{}", message);
//!     }
//!
//!     let xml = serialize_pretty(&service.steps)?;
//!     println!("{}", String::from_utf8_lossy(&xml));
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod artifact;
pub mod config;
pub mod error;
pub mod model;
pub mod order;
pub mod path;
pub mod persist;
pub mod prelude;
pub mod validation;
