use crate::model::{ElementLookup, ElementRef, Pipeline, StepGraph, StepKind, StepType, VmService};
use crate::path::{ParsedPath, expression_body, loose_variables, path_variables, variables};
use tracing::debug;

/// Pipeline elements that no step reads or writes.
///
/// Only the outermost unused elements are listed; their descendants are
/// implied.
pub fn find_unused_pipeline_elements(service: &VmService) -> Vec<ElementRef> {
    let marks: Vec<ElementRef> = referenced_variables(&service.steps)
        .iter()
        .filter_map(|path| deepest_match(&service.pipeline, path))
        .collect();

    let unused: Vec<ElementRef> = service
        .pipeline
        .flatten()
        .into_iter()
        .filter(|element| {
            !marks
                .iter()
                .any(|mark| mark.contains(element) || element.contains(mark))
        })
        .collect();

    unused
        .iter()
        .filter(|element| {
            !unused
                .iter()
                .any(|other| other != *element && other.contains(element))
        })
        .cloned()
        .collect()
}

/// Removes every unused element from the pipeline and returns what went.
pub fn remove_unused_elements(service: &mut VmService) -> Vec<ElementRef> {
    let unused = find_unused_pipeline_elements(service);
    let removed: Vec<ElementRef> = unused
        .into_iter()
        .filter(|element| service.pipeline.remove_element(element).is_some())
        .collect();
    debug!(count = removed.len(), service = %service.id, "removed unused pipeline elements");
    removed
}

/// Every variable mentioned anywhere in the tree that may address the
/// pipeline. Text that does not tokenize falls back to a loose scan, so a
/// syntax error never makes a referenced element look unused.
fn referenced_variables(graph: &StepGraph) -> Vec<ParsedPath> {
    let mut found = Vec::new();
    for node in graph.depth_first() {
        let Some(step) = graph.step(node) else {
            continue;
        };
        let in_invoke =
            graph.parent(node).and_then(|p| graph.step_type(p)) == Some(StepType::Invoke);

        // Labels are free text, so a bare slot name in one means nothing.
        if let Some(label) = step.label.as_deref() {
            let label_variables = text_variables(label);
            found.extend(label_variables.into_iter().filter(|v| v.depth() > 1));
        }
        match &step.kind {
            StepKind::Link(link) => {
                match link.source_path() {
                    Some(from) => found.extend(path_text_variables(from)),
                    None => found.extend(expression_variables(&link.from)),
                }
                if !in_invoke {
                    found.extend(path_text_variables(&link.to));
                }
            }
            StepKind::Drop(drop) if !in_invoke => {
                found.extend(path_text_variables(&drop.path));
            }
            StepKind::Throw(throw) => {
                if let Some(message) = throw.message.as_deref() {
                    found.extend(expression_variables(message));
                }
            }
            StepKind::For(each) => found.extend(query_variables(&each.query)),
            StepKind::Switch(switch) => found.extend(query_variables(&switch.query)),
            _ => {}
        }
    }
    found
}

fn text_variables(text: &str) -> Vec<ParsedPath> {
    variables(text).unwrap_or_else(|_| loose_variables(text))
}

fn path_text_variables(text: &str) -> Vec<ParsedPath> {
    ParsedPath::parse(text)
        .and_then(|path| path_variables(&path))
        .unwrap_or_else(|_| loose_variables(text))
}

/// Variables of an `=` expression; a plain literal has none.
fn expression_variables(text: &str) -> Vec<ParsedPath> {
    expression_body(text).map(text_variables).unwrap_or_default()
}

fn query_variables(query: &str) -> Vec<ParsedPath> {
    text_variables(expression_body(query).unwrap_or(query))
}

/// The deepest pipeline element a path reaches, as a slot-first reference.
///
/// A path naming only a slot marks the whole slot; a path whose first
/// element below the slot is unknown marks nothing.
fn deepest_match(pipeline: &Pipeline, path: &ParsedPath) -> Option<ElementRef> {
    let mut segments = path.segments();
    let slot = pipeline.slot(&segments.next()?.name)?;
    let mut matched = vec![slot.name.clone()];
    let mut current = slot;
    for segment in segments {
        match current.lookup(&segment.name) {
            Some(child) => {
                matched.push(child.name.clone());
                current = child;
            }
            None => break,
        }
    }
    if matched.len() == 1 && path.depth() > 1 {
        return None;
    }
    Some(ElementRef::new(matched))
}
