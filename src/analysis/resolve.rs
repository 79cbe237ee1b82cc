use crate::artifact::Repository;
use crate::error::PathParseError;
use crate::model::{
    Element, ElementLookup, INPUT, NodeId, OUTPUT, Pipeline, Step, StepGraph, StepKind, StepTree,
    StepType, VmService,
};
use crate::path::{ParsedPath, expression_body, variables};
use tracing::debug;

/// Which side of a link is being resolved. Drops resolve like `To`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkEnd {
    From,
    To,
}

/// Outcome of resolving a path against the structures visible to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path names this element.
    Element(Element),
    /// The path cannot be checked statically (local variable, unknown
    /// service signature, unresolvable type reference, literal value).
    Opaque,
    Unresolved(String),
}

impl Resolution {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved(_))
    }
}

/// A link or drop end that no longer resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dangling {
    pub node: NodeId,
    pub step_id: String,
    pub end: LinkEnd,
    pub path: String,
    pub reason: String,
}

/// Resolves link and drop paths against the pipeline, sibling invoke results
/// and local variables in scope.
pub struct Resolver<'a, R: Repository> {
    graph: &'a StepGraph,
    pipeline: &'a Pipeline,
    repository: &'a R,
}

impl<'a, R: Repository> Resolver<'a, R> {
    pub fn new(service: &'a VmService, repository: &'a R) -> Self {
        Self {
            graph: &service.steps,
            pipeline: &service.pipeline,
            repository,
        }
    }

    pub fn with_parts(graph: &'a StepGraph, pipeline: &'a Pipeline, repository: &'a R) -> Self {
        Self {
            graph,
            pipeline,
            repository,
        }
    }

    /// Resolves one end of the link or drop at `node`.
    ///
    /// Fixed values resolve to `Opaque` unless they are `=` expressions, in
    /// which case every variable of the expression must resolve.
    pub fn resolve_end(&self, node: NodeId, end: LinkEnd) -> Result<Resolution, PathParseError> {
        let Some(step) = self.graph.step(node) else {
            return Ok(Resolution::Unresolved(format!("node {} is gone", node.index())));
        };
        let Some(scope) = self.graph.parent(node) else {
            return Ok(Resolution::Unresolved("step has no scope".to_string()));
        };
        match (&step.kind, end) {
            (StepKind::Link(link), LinkEnd::From) if link.fixed_value => {
                match expression_body(&link.from) {
                    Some(expr) => self.resolve_expression(scope, expr),
                    None => Ok(Resolution::Opaque),
                }
            }
            (StepKind::Link(link), LinkEnd::From) => self.resolve_text(scope, &link.from, end),
            (StepKind::Link(link), LinkEnd::To) => self.resolve_text(scope, &link.to, end),
            (StepKind::Drop(drop), _) => self.resolve_text(scope, &drop.path, LinkEnd::To),
            _ => Ok(Resolution::Opaque),
        }
    }

    pub fn resolve_text(
        &self,
        scope: NodeId,
        text: &str,
        end: LinkEnd,
    ) -> Result<Resolution, PathParseError> {
        let path = ParsedPath::parse(text)?;
        Ok(self.resolve(scope, &path, end))
    }

    /// Resolves every variable of an expression; the first failure wins.
    pub fn resolve_expression(
        &self,
        scope: NodeId,
        expr: &str,
    ) -> Result<Resolution, PathParseError> {
        for variable in variables(expr)? {
            let resolution = self.resolve(scope, &variable, LinkEnd::From);
            if resolution.is_unresolved() {
                return Ok(resolution);
            }
        }
        Ok(Resolution::Opaque)
    }

    /// Resolves `path` as seen from a step whose parent is `scope`.
    ///
    /// Inside an invoke the target side addresses the invoked service's own
    /// signature; everything else is resolved in the enclosing map's scope.
    pub fn resolve(&self, scope: NodeId, path: &ParsedPath, end: LinkEnd) -> Resolution {
        let scope_step = self.graph.step(scope);
        if end == LinkEnd::To {
            if let Some(invoke) = scope_step.and_then(Step::as_invoke) {
                let Some(signature) = self.repository.signature(&invoke.service_id) else {
                    return Resolution::Opaque;
                };
                return self.walk(&signature.as_slots(false), path);
            }
        }

        let root = path.root_name();
        if root == INPUT || root == OUTPUT {
            return self.walk(self.pipeline, path);
        }

        let map = match scope_step.map(Step::step_type) {
            Some(StepType::Map) => Some(scope),
            Some(StepType::Invoke) => self.graph.parent(scope),
            _ => None,
        };
        if let Some(owner) = map.and_then(|m| self.graph.result_owner(m, root)) {
            let Some(invoke) = self.graph.step(owner).and_then(Step::as_invoke) else {
                return Resolution::Opaque;
            };
            let Some(signature) = self.repository.signature(&invoke.service_id) else {
                return Resolution::Opaque;
            };
            let batch = invoke
                .target
                .as_deref()
                .is_some_and(|t| self.repository.is_batch_target(t));
            return match path.child.as_deref() {
                Some(rest) => self.walk(&signature.as_slots(batch), rest),
                None => Resolution::Opaque,
            };
        }

        if local_variables(self.graph, scope).iter().any(|v| v == root) {
            return Resolution::Opaque;
        }
        Resolution::Unresolved(format!("unknown variable '{}'", root))
    }

    fn walk(&self, lookup: &dyn ElementLookup, path: &ParsedPath) -> Resolution {
        let Some(mut current) = lookup.lookup(&path.name) else {
            return Resolution::Unresolved(format!("no element named '{}'", path.name));
        };
        let mut next = path.child.as_deref();
        while let Some(segment) = next {
            if let Some(type_id) = current.type_reference() {
                let Some(crate::artifact::Artifact::Type(elements)) =
                    self.repository.resolve(type_id)
                else {
                    return Resolution::Opaque;
                };
                return self.walk(&elements, segment);
            }
            match current.lookup(&segment.name) {
                Some(child) => current = child,
                None => {
                    return Resolution::Unresolved(format!(
                        "'{}' has no element named '{}'",
                        current.name, segment.name
                    ));
                }
            }
            next = segment.child.as_deref();
        }
        Resolution::Element(current.clone())
    }
}

/// Names declared by enclosing loops, catches and transactional sequences.
pub fn local_variables(graph: &StepGraph, scope: NodeId) -> Vec<String> {
    let mut chain = vec![scope];
    chain.extend(graph.ancestors(scope));
    let mut names = Vec::new();
    for node in chain {
        match graph.step(node).map(|s| &s.kind) {
            Some(StepKind::For(each)) => {
                names.push(each.variable.clone());
                names.extend(each.index.clone());
            }
            Some(StepKind::Catch(catch)) => names.extend(catch.variable.clone()),
            Some(StepKind::Sequence(seq)) => names.extend(seq.transaction_variable.clone()),
            _ => {}
        }
    }
    names.retain(|n| !n.is_empty());
    names
}

/// Every link or drop end in the service that does not resolve.
///
/// Ends that fail to parse are left to validation.
pub fn find_dangling_links<R: Repository>(service: &VmService, repository: &R) -> Vec<Dangling> {
    let resolver = Resolver::new(service, repository);
    let graph = &service.steps;
    let mut dangling = Vec::new();
    for node in graph.depth_first() {
        let Some(step) = graph.step(node) else {
            continue;
        };
        let ends: Vec<(LinkEnd, &str)> = match &step.kind {
            StepKind::Link(link) => vec![(LinkEnd::From, &link.from), (LinkEnd::To, &link.to)],
            StepKind::Drop(drop) => vec![(LinkEnd::To, &drop.path)],
            _ => continue,
        };
        for (end, text) in ends {
            if let Ok(Resolution::Unresolved(reason)) = resolver.resolve_end(node, end) {
                dangling.push(Dangling {
                    node,
                    step_id: step.id.clone(),
                    end,
                    path: text.to_string(),
                    reason,
                });
            }
        }
    }
    dangling
}

/// Removes one dangling link or drop. Whether to do so is the caller's policy.
pub fn remove_dangling(service: &mut VmService, dangling: &Dangling) -> Option<StepTree> {
    let step = service.steps.step(dangling.node)?;
    if step.id != dangling.step_id {
        return None;
    }
    debug!(id = %dangling.step_id, path = %dangling.path, "removing dangling step");
    service.steps.remove(dangling.node)
}
