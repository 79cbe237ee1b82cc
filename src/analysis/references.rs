use crate::artifact::Repository;
use crate::model::{Step, VmService, type_references_of};
use itertools::Itertools;
use tracing::debug;

/// The external ids this service depends on, first-seen depth-first:
/// the implemented interface and its type references, the pipeline's type
/// references, then every invoked service.
pub fn compute_references<R: Repository>(service: &VmService, repository: &R) -> Vec<String> {
    let mut references: Vec<String> = Vec::new();

    if let Some(interface) = service.pipeline.interface.as_deref() {
        references.push(interface.to_string());
        if let Some(signature) = repository.signature(interface) {
            references.extend(
                type_references_of(&signature.input)
                    .into_iter()
                    .chain(type_references_of(&signature.output))
                    .map(str::to_string),
            );
        }
    }

    references.extend(
        service
            .pipeline
            .type_references()
            .into_iter()
            .map(str::to_string),
    );

    let graph = &service.steps;
    references.extend(
        graph
            .depth_first()
            .into_iter()
            .filter_map(|node| graph.step(node).and_then(Step::as_invoke))
            .map(|invoke| invoke.service_id.clone())
            .filter(|id| !id.is_empty()),
    );

    references.into_iter().unique().collect()
}

/// Rewrites every reference to `old_id` and returns how many were changed.
///
/// Link paths are left alone: result names do not depend on the invoked id.
pub fn rename_reference(service: &mut VmService, old_id: &str, new_id: &str) -> usize {
    if old_id == new_id {
        return 0;
    }
    let mut count = 0;

    if service.pipeline.interface.as_deref() == Some(old_id) {
        service.pipeline.interface = Some(new_id.to_string());
        count += 1;
    }
    count += service.pipeline.rename_type_reference(old_id, new_id);

    let graph = &mut service.steps;
    for node in graph.depth_first() {
        if let Some(invoke) = graph.step_mut(node).and_then(Step::as_invoke_mut) {
            if invoke.service_id == old_id {
                invoke.service_id = new_id.to_string();
                count += 1;
            }
        }
    }

    debug!(old = old_id, new = new_id, count, "renamed reference");
    count
}
