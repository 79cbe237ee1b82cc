//! The VM Service entity model: typed steps, the step graph and the pipeline.

pub mod graph;
pub mod pipeline;
pub mod service;
pub mod step;

pub use graph::{CaseKey, NodeId, StepGraph, StepNode, StepTree};
pub use pipeline::{
    Element, ElementKind, ElementLookup, ElementRef, INPUT, OUTPUT, Pipeline, type_references_of,
};
pub use service::VmService;
pub use step::{
    CatchStep, DropStep, ForStep, InvokeStep, LinkStep, SequenceStep, Step, StepKind, StepType,
    SwitchStep, ThrowStep, generate_id, generate_result_name,
};
