use super::graph::{NodeId, StepGraph};
use super::pipeline::Pipeline;
use super::step::{Step, StepType};
use crate::analysis::{LinkEnd, Resolution, Resolver};
use crate::artifact::Repository;
use crate::error::{LinkError, StepRejected};
use crate::order;
use crate::path::{ParsedPath, expression_body, tokenize};
use tracing::debug;

/// A flow program: its pipeline contract and its step tree.
#[derive(Debug, Clone, Default)]
pub struct VmService {
    pub id: String,
    pub pipeline: Pipeline,
    pub steps: StepGraph,
}

impl VmService {
    /// An empty service: empty pipeline slots and a bare root sequence.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pipeline: Pipeline::default(),
            steps: StepGraph::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_steps(mut self, steps: StepGraph) -> Self {
        self.steps = steps;
        self
    }

    /// Adds an invoke of `service_id` to `map`, ordered after every invoke
    /// already there.
    pub fn add_invoke(&mut self, map: NodeId, service_id: &str) -> Result<NodeId, StepRejected> {
        let next_order = self
            .steps
            .invokes(map)
            .into_iter()
            .filter_map(|n| self.steps.step(n).and_then(Step::as_invoke))
            .map(|i| i.invocation_order)
            .max()
            .map_or(0, |highest| highest.saturating_add(1));

        let mut step = Step::invoke(service_id);
        if let Some(invoke) = step.as_invoke_mut() {
            invoke.invocation_order = next_order;
        }
        self.steps.add_child(map, step)
    }

    /// Draws a link from `from` to `to` inside a map or an invoke.
    ///
    /// Both ends must parse and resolve in the scope; list segments along a
    /// pipeline path without an index get `[0]`. Drawing into an invoke bumps
    /// its invocation order past the invoke it reads from.
    pub fn draw_link<R: Repository>(
        &mut self,
        scope: NodeId,
        from: &str,
        to: &str,
        repository: &R,
    ) -> Result<NodeId, LinkError> {
        let scope_type = self.check_scope(scope)?;
        let mut from_path = ParsedPath::parse(from)?;
        let mut to_path = ParsedPath::parse(to)?;

        let resolver = Resolver::new(self, repository);
        let from_resolution = resolver.resolve(scope, &from_path, LinkEnd::From);
        let to_resolution = resolver.resolve(scope, &to_path, LinkEnd::To);
        for (path, resolution) in [(from, &from_resolution), (to, &to_resolution)] {
            if resolution.is_unresolved() {
                return Err(LinkError::Unresolved {
                    path: path.to_string(),
                    step_id: self.scope_id(scope),
                });
            }
        }

        if let (Resolution::Element(source), Resolution::Element(target)) =
            (&from_resolution, &to_resolution)
        {
            if self.pipeline.slot(from_path.root_name()).is_some() {
                from_path.set_default_index(&self.pipeline, !target.list);
            }
            if scope_type == StepType::Map && self.pipeline.slot(to_path.root_name()).is_some() {
                to_path.set_default_index(&self.pipeline, !source.list);
            }
        }

        let node = self
            .steps
            .add_child(scope, Step::link(from_path.to_string(), to_path.to_string()))?;
        if scope_type == StepType::Invoke {
            order::bump_after_link(&mut self.steps, node);
        }
        debug!(from = %from_path, to = %to_path, "drew link");
        Ok(node)
    }

    /// Assigns a literal, or an `=` expression, to `to`.
    pub fn draw_fixed_value(
        &mut self,
        scope: NodeId,
        value: &str,
        to: &str,
    ) -> Result<NodeId, LinkError> {
        let scope_type = self.check_scope(scope)?;
        ParsedPath::parse(to)?;
        if let Some(expr) = expression_body(value) {
            tokenize(expr)?;
        }
        let node = self.steps.add_child(scope, Step::fixed_value(value, to))?;
        if scope_type == StepType::Invoke {
            order::bump_after_link(&mut self.steps, node);
        }
        Ok(node)
    }

    fn check_scope(&self, scope: NodeId) -> Result<StepType, LinkError> {
        match self.steps.step_type(scope) {
            Some(step_type @ (StepType::Map | StepType::Invoke)) => Ok(step_type),
            Some(_) => Err(LinkError::NotAScope(self.scope_id(scope))),
            None => Err(StepRejected::MissingNode(scope.index()).into()),
        }
    }

    fn scope_id(&self, scope: NodeId) -> String {
        self.steps
            .step(scope)
            .map(|s| s.id.clone())
            .unwrap_or_default()
    }
}
