//! Structural and referential checks over a VM Service.
//!
//! Validation never fails: every problem becomes a [`ValidationMessage`].
//! The one exception to "report only" is id uniqueness, which is repaired in
//! place so that later passes can rely on ids.

mod message;

pub use message::{MessageKind, Severity, ValidationMessage};

use crate::analysis::{LinkEnd, find_dangling_links};
use crate::artifact::{Artifact, InvokeTarget, NoRepository, Repository};
use crate::config::EditorConfig;
use crate::model::{CaseKey, NodeId, StepGraph, StepKind, StepType, VmService, generate_id};
use crate::order;
use crate::path::{ParsedPath, expression_body, tokenize};
use ahash::AHashSet;
use itertools::Itertools;
use tracing::{debug, warn};

/// Runs every check against a service.
///
/// ```rust,no_run
/// use vmflow::prelude::*;
///
/// let config = EditorConfig::default();
/// let repository = MemoryRepository::new();
/// let mut service = VmService::new("orders.submit");
/// let messages = Validator::new(&config)
///     .with_repository(&repository)
///     .validate(&mut service);
/// assert!(messages.iter().all(|m| !m.is_error()));
/// ```
pub struct Validator<'a, R: Repository = NoRepository> {
    config: &'a EditorConfig,
    repository: Option<R>,
}

impl<'a> Validator<'a, NoRepository> {
    pub fn new(config: &'a EditorConfig) -> Self {
        Self {
            config,
            repository: None,
        }
    }
}

impl<'a, R: Repository> Validator<'a, R> {
    /// Enables the checks that need the hosting repository: invoked services,
    /// execution targets and link resolution.
    pub fn with_repository<S: Repository>(self, repository: S) -> Validator<'a, S> {
        Validator {
            config: self.config,
            repository: Some(repository),
        }
    }

    pub fn validate(&self, service: &mut VmService) -> Vec<ValidationMessage> {
        let mut messages = repair_ids(&mut service.steps);

        let graph = &service.steps;
        for node in graph.depth_first() {
            check_nesting(graph, node, &mut messages);
            check_attributes(graph, node, &mut messages);
            check_syntax(graph, node, &mut messages);
            check_cases(graph, node, &mut messages);
            check_placement(graph, node, &mut messages);
            if self.config.report_index_queries {
                check_index_queries(graph, node, &mut messages);
            }
        }

        if let Some(repository) = &self.repository {
            check_repository(service, repository, &mut messages);
        }

        for map in graph
            .depth_first()
            .into_iter()
            .filter(|n| graph.step_type(*n) == Some(StepType::Map))
        {
            messages.extend(order::check(graph, map));
        }

        debug!(
            service = %service.id,
            errors = messages.iter().filter(|m| m.is_error()).count(),
            total = messages.len(),
            "validated service"
        );
        messages
    }
}

/// Validates without a repository and with the default configuration.
pub fn validate(service: &mut VmService) -> Vec<ValidationMessage> {
    Validator::new(&EditorConfig::default()).validate(service)
}

/// Gives every step whose id is empty or already taken a fresh id.
fn repair_ids(graph: &mut StepGraph) -> Vec<ValidationMessage> {
    let mut seen = AHashSet::new();
    let mut messages = Vec::new();
    for node in graph.depth_first() {
        let Some(step) = graph.step_mut(node) else {
            continue;
        };
        if !step.id.is_empty() && seen.insert(step.id.clone()) {
            continue;
        }
        let old = std::mem::replace(&mut step.id, generate_id());
        seen.insert(step.id.clone());
        warn!(old = %old, new = %step.id, "reassigned duplicate step id");
        messages.push(ValidationMessage::info(
            MessageKind::DuplicateId,
            format!("Step id '{}' was already in use and has been replaced", old),
            graph.context(node),
        ));
    }
    messages
}

fn check_nesting(graph: &StepGraph, node: NodeId, messages: &mut Vec<ValidationMessage>) {
    let Some(step_type) = graph.step_type(node) else {
        return;
    };
    match graph.parent(node).and_then(|p| graph.step_type(p)) {
        Some(parent_type) if !parent_type.accepts(step_type) => {
            messages.push(ValidationMessage::error(
                MessageKind::IllegalNesting,
                format!("A '{}' step cannot contain a '{}' step", parent_type, step_type),
                graph.context(node),
            ));
        }
        None if step_type != StepType::Sequence => {
            messages.push(ValidationMessage::error(
                MessageKind::IllegalNesting,
                format!("The root step must be a sequence, found '{}'", step_type),
                graph.context(node),
            ));
        }
        _ => {}
    }
}

fn check_attributes(graph: &StepGraph, node: NodeId, messages: &mut Vec<ValidationMessage>) {
    let Some(step) = graph.step(node) else {
        return;
    };
    let mut missing = Vec::new();
    match &step.kind {
        StepKind::Invoke(invoke) => {
            if invoke.service_id.is_empty() {
                missing.push("serviceId");
            }
            if invoke.result_name.is_empty() {
                missing.push("resultName");
            }
        }
        StepKind::For(each) => {
            if each.query.is_empty() {
                missing.push("query");
            }
            if each.variable.is_empty() {
                missing.push("variable");
            }
        }
        StepKind::Switch(switch) if switch.query.is_empty() => missing.push("query"),
        StepKind::Link(link) => {
            if link.to.is_empty() {
                missing.push("to");
            }
            if !link.fixed_value && link.from.is_empty() {
                missing.push("from");
            }
        }
        StepKind::Drop(drop) if drop.path.is_empty() => missing.push("path"),
        StepKind::Throw(throw) if throw.code.is_none() && throw.message.is_none() => {
            messages.push(ValidationMessage::warning(
                MessageKind::MissingAttribute,
                "Throw step has neither a code nor a message",
                graph.context(node),
            ));
        }
        _ => {}
    }
    for attribute in missing {
        messages.push(ValidationMessage::error(
            MessageKind::MissingAttribute,
            format!("'{}' step is missing '{}'", step.step_type(), attribute),
            graph.context(node),
        ));
    }
}

fn check_syntax(graph: &StepGraph, node: NodeId, messages: &mut Vec<ValidationMessage>) {
    let Some(step) = graph.step(node) else {
        return;
    };
    let mut paths: Vec<&str> = Vec::new();
    let mut expressions: Vec<&str> = Vec::new();
    match &step.kind {
        StepKind::Link(link) => {
            match link.source_path() {
                Some(from) => paths.push(from),
                None => expressions.extend(expression_body(&link.from)),
            }
            paths.push(&link.to);
        }
        StepKind::Drop(drop) => paths.push(&drop.path),
        StepKind::For(each) => expressions.push(expression_body(&each.query).unwrap_or(&each.query)),
        StepKind::Switch(switch) => {
            expressions.push(expression_body(&switch.query).unwrap_or(&switch.query))
        }
        StepKind::Throw(throw) => {
            expressions.extend(throw.message.as_deref().and_then(expression_body))
        }
        _ => {}
    }

    let errors = paths
        .into_iter()
        .filter(|p| !p.is_empty())
        .filter_map(|p| ParsedPath::parse(p).err())
        .chain(
            expressions
                .into_iter()
                .filter(|e| !e.trim().is_empty())
                .filter_map(|e| tokenize(e).err()),
        );
    for error in errors {
        messages.push(ValidationMessage::error(
            MessageKind::ParseError,
            error.to_string(),
            graph.context(node),
        ));
    }
}

/// A switch may have at most one default case and no repeated labels.
fn check_cases(graph: &StepGraph, node: NodeId, messages: &mut Vec<ValidationMessage>) {
    if graph.step_type(node) != Some(StepType::Switch) {
        return;
    }
    let keys: Vec<CaseKey<'_>> = graph
        .children(node)
        .iter()
        .filter_map(|c| graph.case_key(*c))
        .collect();

    let defaults = keys.iter().filter(|k| **k == CaseKey::Default).count();
    if defaults > 1 {
        messages.push(ValidationMessage::error(
            MessageKind::DuplicateCase,
            format!("Switch has {} default cases", defaults),
            graph.context(node),
        ));
    }
    for label in keys
        .iter()
        .filter_map(|k| match k {
            CaseKey::Labeled(label) => Some(*label),
            CaseKey::Default => None,
        })
        .duplicates()
    {
        messages.push(ValidationMessage::error(
            MessageKind::DuplicateCase,
            format!("Switch has more than one case labeled '{}'", label),
            graph.context(node),
        ));
    }
}

fn check_placement(graph: &StepGraph, node: NodeId, messages: &mut Vec<ValidationMessage>) {
    if graph.step_type(node) == Some(StepType::Break)
        && graph.enclosing(node, StepType::For).is_none()
    {
        messages.push(ValidationMessage::error(
            MessageKind::Misplaced,
            "Break step outside of a for loop",
            graph.context(node),
        ));
    }
}

fn check_index_queries(graph: &StepGraph, node: NodeId, messages: &mut Vec<ValidationMessage>) {
    let Some(link) = graph.step(node).and_then(|s| s.as_link()) else {
        return;
    };
    let ends = link.source_path().into_iter().chain([link.to.as_str()]);
    let runtime = ends
        .filter_map(|text| ParsedPath::parse(text).ok())
        .any(|path| path.has_index_query());
    if runtime {
        messages.push(ValidationMessage::info(
            MessageKind::RuntimeIndex,
            "Link uses a computed index and is only checked at runtime",
            graph.context(node),
        ));
    }
}

fn check_repository<R: Repository>(
    service: &VmService,
    repository: &R,
    messages: &mut Vec<ValidationMessage>,
) {
    let graph = &service.steps;
    let targets = repository.execution_targets();
    for node in graph.depth_first() {
        let Some(invoke) = graph.step(node).and_then(|s| s.as_invoke()) else {
            continue;
        };
        if !invoke.service_id.is_empty()
            && !matches!(
                repository.resolve(&invoke.service_id),
                Some(Artifact::Service(_))
            )
        {
            messages.push(ValidationMessage::error(
                MessageKind::UnknownService,
                format!("Service '{}' does not exist", invoke.service_id),
                graph.context(node),
            ));
        }
        if let InvokeTarget::Runner(runner) = InvokeTarget::parse(invoke.target.as_deref()) {
            if !targets.contains(&runner) {
                messages.push(ValidationMessage::warning(
                    MessageKind::UnknownTarget,
                    format!("Execution target '{}' is not known", runner),
                    graph.context(node),
                ));
            }
        }
    }

    for dangling in find_dangling_links(service, repository) {
        let side = match dangling.end {
            LinkEnd::From => "source",
            LinkEnd::To => "target",
        };
        messages.push(ValidationMessage::error(
            MessageKind::UnresolvedReference,
            format!(
                "The {} path '{}' does not resolve: {}",
                side, dangling.path, dangling.reason
            ),
            graph.context(dangling.node),
        ));
    }
}
