//! Invocation order of the invokes inside one map.
//!
//! A link inside invoke `B` that reads invoke `A`'s result makes `B` depend
//! on `A`; a valid ordering gives `A` a strictly smaller invocation order.
//! Violations are reported as validation messages, never as errors, because
//! a graph under edit is allowed to be temporarily out of order.

use crate::model::{NodeId, Step, StepGraph, StepKind};
use crate::path::{ParsedPath, expression_body, loose_variables, path_variables, variables};
use crate::validation::{MessageKind, ValidationMessage};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// `target` must run after `source` because `link` (a child of `target`)
/// reads `source`'s result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub source: NodeId,
    pub target: NodeId,
    pub link: NodeId,
}

/// Root names read by a link's source side, fixed value expressions included.
fn source_roots(step: &Step) -> Vec<String> {
    let Some(link) = step.as_link() else {
        return Vec::new();
    };
    let found = match link.source_path() {
        Some(from) => ParsedPath::parse(from)
            .and_then(|p| path_variables(&p))
            .unwrap_or_else(|_| loose_variables(from)),
        None => expression_body(&link.from)
            .map(|expr| variables(expr).unwrap_or_else(|_| loose_variables(expr)))
            .unwrap_or_default(),
    };
    found
        .into_iter()
        .map(|p| p.root_name().to_string())
        .unique()
        .collect()
}

fn order_of(graph: &StepGraph, node: NodeId) -> Option<i32> {
    graph
        .step(node)
        .and_then(Step::as_invoke)
        .map(|i| i.invocation_order)
}

fn set_order(graph: &mut StepGraph, node: NodeId, order: i32) {
    if let Some(invoke) = graph.step_mut(node).and_then(Step::as_invoke_mut) {
        invoke.invocation_order = order;
    }
}

/// Dependency edges between the invokes of `map`, one per (source, target)
/// pair, in child order.
pub fn dependencies(graph: &StepGraph, map: NodeId) -> Vec<Dependency> {
    let invokes = graph.invokes(map);
    let mut edges = Vec::new();
    for &target in &invokes {
        for &link in graph.children(target) {
            let Some(step) = graph.step(link) else {
                continue;
            };
            for root in source_roots(step) {
                if let Some(source) = graph.result_owner(map, &root) {
                    edges.push(Dependency {
                        source,
                        target,
                        link,
                    });
                }
            }
        }
    }
    edges
        .into_iter()
        .unique_by(|d| (d.source, d.target))
        .collect()
}

/// Applies the order bump after `link` was drawn into an invoke.
///
/// Only the invoke that owns the link is moved, to one past its latest
/// source. Its own dependents are not touched; run [`recompute`] for that.
/// Returns whether an order changed.
pub fn bump_after_link(graph: &mut StepGraph, link: NodeId) -> bool {
    let Some(target) = graph.parent(link) else {
        return false;
    };
    let Some(target_order) = order_of(graph, target) else {
        return false;
    };
    let Some(map) = graph.parent(target) else {
        return false;
    };
    let Some(step) = graph.step(link) else {
        return false;
    };

    let latest_source = source_roots(step)
        .iter()
        .filter_map(|root| graph.result_owner(map, root))
        .filter(|source| *source != target)
        .filter_map(|source| order_of(graph, source))
        .max();

    // A source already at i32::MAX cannot be followed; `check` reports it.
    let bumped = latest_source
        .filter(|source_order| *source_order >= target_order)
        .map(|source_order| source_order.saturating_add(1))
        .filter(|bumped| *bumped != target_order);
    match bumped {
        Some(order) => {
            debug!(
                node = target.index(),
                from = target_order,
                to = order,
                "bumped invocation order"
            );
            set_order(graph, target, order);
            true
        }
        None => false,
    }
}

/// Re-derives every invocation order in `map` from the declared orders and
/// the dependency edges.
///
/// Each invoke gets `max(declared, max(source) + 1)`. Invokes on a cycle
/// keep their declared order; every edge on a cycle, and any edge still out
/// of order afterwards, is reported.
pub fn recompute(graph: &mut StepGraph, map: NodeId) -> Vec<ValidationMessage> {
    let invokes = graph.invokes(map);
    let edges = dependencies(graph, map);
    let position: AHashMap<NodeId, usize> =
        invokes.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let cyclic: AHashSet<(NodeId, NodeId)> = edges
        .iter()
        .filter(|d| reaches(&edges, d.target, d.source))
        .map(|d| (d.source, d.target))
        .collect();
    let on_cycle: AHashSet<NodeId> = cyclic.iter().flat_map(|(s, t)| [*s, *t]).collect();
    let acyclic: Vec<&Dependency> = edges
        .iter()
        .filter(|d| !cyclic.contains(&(d.source, d.target)))
        .collect();

    let mut indegree: AHashMap<NodeId, usize> = invokes.iter().map(|n| (*n, 0)).collect();
    for edge in &acyclic {
        *indegree.entry(edge.target).or_default() += 1;
    }

    let mut assigned: AHashMap<NodeId, i32> = invokes
        .iter()
        .filter_map(|n| order_of(graph, *n).map(|o| (*n, o)))
        .collect();

    let by_declared = |nodes: &mut Vec<NodeId>, assigned: &AHashMap<NodeId, i32>| {
        nodes.sort_by_key(|n| (assigned.get(n).copied(), position.get(n).copied()));
    };

    let mut ready: Vec<NodeId> = invokes
        .iter()
        .copied()
        .filter(|n| indegree.get(n) == Some(&0))
        .collect();
    by_declared(&mut ready, &assigned);
    let mut queue: VecDeque<NodeId> = ready.into();

    while let Some(node) = queue.pop_front() {
        let order = assigned.get(&node).copied().unwrap_or_default();
        let mut released = Vec::new();
        for edge in acyclic.iter().filter(|d| d.source == node) {
            if !on_cycle.contains(&edge.target) {
                let current = assigned.entry(edge.target).or_default();
                *current = (*current).max(order.saturating_add(1));
            }
            if let Some(count) = indegree.get_mut(&edge.target) {
                *count -= 1;
                if *count == 0 {
                    released.push(edge.target);
                }
            }
        }
        by_declared(&mut released, &assigned);
        queue.extend(released);
    }

    for (node, order) in &assigned {
        if order_of(graph, *node) != Some(*order) {
            debug!(node = node.index(), order, "recomputed invocation order");
            set_order(graph, *node, *order);
        }
    }

    let graph: &StepGraph = graph;
    let mut messages: Vec<ValidationMessage> = edges
        .iter()
        .filter(|d| cyclic.contains(&(d.source, d.target)))
        .map(|d| {
            ValidationMessage::error(
                MessageKind::OrderingViolation,
                format!(
                    "Invoke '{}' and invoke '{}' depend on each other",
                    describe(graph, d.source),
                    describe(graph, d.target)
                ),
                graph.context(d.link),
            )
        })
        .collect();
    messages.extend(
        acyclic
            .into_iter()
            .filter(|d| out_of_order(graph, d))
            .map(|d| violation(graph, d)),
    );
    messages
}

/// Reports every dependency whose source does not run strictly first.
pub fn check(graph: &StepGraph, map: NodeId) -> Vec<ValidationMessage> {
    dependencies(graph, map)
        .iter()
        .filter(|d| out_of_order(graph, d))
        .map(|d| violation(graph, d))
        .collect()
}

/// The invokes of `map` grouped by invocation order, lowest first; each
/// group keeps child order.
pub fn execution_plan(graph: &StepGraph, map: NodeId) -> Vec<Vec<NodeId>> {
    let mut groups: BTreeMap<i32, Vec<NodeId>> = BTreeMap::new();
    for invoke in graph.invokes(map) {
        if let Some(order) = order_of(graph, invoke) {
            groups.entry(order).or_default().push(invoke);
        }
    }
    groups.into_values().collect()
}

fn out_of_order(graph: &StepGraph, dependency: &Dependency) -> bool {
    match (
        order_of(graph, dependency.source),
        order_of(graph, dependency.target),
    ) {
        (Some(source), Some(target)) => source >= target,
        _ => false,
    }
}

fn violation(graph: &StepGraph, dependency: &Dependency) -> ValidationMessage {
    ValidationMessage::error(
        MessageKind::OrderingViolation,
        format!(
            "Invoke '{}' reads the result of '{}' but does not run after it",
            describe(graph, dependency.target),
            describe(graph, dependency.source)
        ),
        graph.context(dependency.link),
    )
}

fn describe(graph: &StepGraph, node: NodeId) -> String {
    match graph.step(node).map(|s| &s.kind) {
        Some(StepKind::Invoke(invoke)) => invoke.service_id.clone(),
        _ => format!("#{}", node.index()),
    }
}

/// Whether `to` is reachable from `from` along `edges`.
fn reaches(edges: &[Dependency], from: NodeId, to: NodeId) -> bool {
    let mut seen = AHashSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        stack.extend(edges.iter().filter(|d| d.source == node).map(|d| d.target));
    }
    false
}
