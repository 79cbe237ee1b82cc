use super::step::{Step, StepKind, StepType};
use crate::config::EditorConfig;
use crate::error::StepRejected;
use crate::path::{expression_body, root_of, variables};
use itertools::Itertools;
use tracing::debug;

/// Handle of a step inside a [`StepGraph`]. Only valid for the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A step plus its position in the tree.
#[derive(Debug, Clone)]
pub struct StepNode {
    pub step: Step,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl StepNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An owned, nested snapshot of a subtree.
///
/// Two graphs are structurally equal when their trees are equal; arena
/// handles and line numbers do not take part in the comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTree {
    pub step: Step,
    pub children: Vec<StepTree>,
}

impl StepTree {
    pub fn leaf(step: Step) -> Self {
        Self {
            step,
            children: Vec::new(),
        }
    }

    pub fn with_children(step: Step, children: Vec<StepTree>) -> Self {
        Self { step, children }
    }

    /// Number of steps in this subtree.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(StepTree::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// The case a direct child of a switch stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKey<'a> {
    Labeled(&'a str),
    Default,
}

/// The step tree of one VM Service, stored as an arena.
///
/// Children are owned through the parent's ordered child list; the parent
/// pointer is a back-reference only. Removed nodes leave empty slots so
/// outstanding handles to other nodes stay valid.
#[derive(Debug, Clone)]
pub struct StepGraph {
    nodes: Vec<Option<StepNode>>,
    root: NodeId,
}

impl Default for StepGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StepGraph {
    /// A graph holding only an empty root sequence.
    pub fn new() -> Self {
        Self::with_root(Step::sequence())
    }

    pub fn with_root(step: Step) -> Self {
        Self {
            nodes: vec![Some(StepNode {
                step,
                parent: None,
                children: Vec::new(),
            })],
            root: NodeId(0),
        }
    }

    /// Rebuilds a graph from a snapshot without checking nesting rules, so
    /// documents with illegal structure can still be loaded and validated.
    pub fn from_tree(tree: StepTree) -> Self {
        let StepTree { step, children } = tree;
        let mut graph = Self::with_root(step);
        let root = graph.root;
        for child in children {
            graph.attach_tree(root, child);
        }
        graph
    }

    fn attach_tree(&mut self, parent: NodeId, tree: StepTree) -> NodeId {
        let StepTree { step, children } = tree;
        let node = self.alloc(parent, step);
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.push(node);
        }
        for child in children {
            self.attach_tree(node, child);
        }
        node
    }

    fn alloc(&mut self, parent: NodeId, step: Step) -> NodeId {
        self.nodes.push(Some(StepNode {
            step,
            parent: Some(parent),
            children: Vec::new(),
        }));
        NodeId(self.nodes.len() - 1)
    }

    fn node_mut(&mut self, node: NodeId) -> Option<&mut StepNode> {
        self.nodes.get_mut(node.0).and_then(Option::as_mut)
    }

    pub fn to_tree(&self) -> StepTree {
        self.subtree(self.root)
            .unwrap_or_else(|| StepTree::leaf(Step::sequence()))
    }

    /// Snapshot of the subtree rooted at `node`, without line numbers.
    pub fn subtree(&self, node: NodeId) -> Option<StepTree> {
        let entry = self.get(node)?;
        let mut step = entry.step.clone();
        step.line_number = None;
        let children = entry
            .children
            .iter()
            .filter_map(|child| self.subtree(*child))
            .collect();
        Some(StepTree { step, children })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, node: NodeId) -> Option<&StepNode> {
        self.nodes.get(node.0).and_then(Option::as_ref)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    pub fn step(&self, node: NodeId) -> Option<&Step> {
        self.get(node).map(|n| &n.step)
    }

    pub fn step_mut(&mut self, node: NodeId) -> Option<&mut Step> {
        self.node_mut(node).map(|n| &mut n.step)
    }

    pub fn step_type(&self, node: NodeId) -> Option<StepType> {
        self.step(node).map(Step::step_type)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Number of live steps, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Pre-order walk of the whole tree.
    pub fn depth_first(&self) -> Vec<NodeId> {
        self.depth_first_from(self.root)
    }

    pub fn depth_first_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !self.contains(node) {
                continue;
            }
            order.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        order
    }

    /// Ancestors of `node`, nearest first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(node);
        while let Some(parent) = current {
            result.push(parent);
            current = self.parent(parent);
        }
        result
    }

    /// Nearest ancestor of the given type.
    pub fn enclosing(&self, node: NodeId, step_type: StepType) -> Option<NodeId> {
        self.ancestors(node)
            .into_iter()
            .find(|a| self.step_type(*a) == Some(step_type))
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).contains(&ancestor)
    }

    pub fn find(&self, step_id: &str) -> Option<NodeId> {
        self.depth_first()
            .into_iter()
            .find(|n| self.step(*n).is_some_and(|s| s.id == step_id))
    }

    pub fn can_add(&self, parent: NodeId, child: StepType) -> bool {
        self.step_type(parent)
            .is_some_and(|parent_type| parent_type.accepts(child))
    }

    fn check_child(&self, parent: NodeId, child: StepType) -> Result<(), StepRejected> {
        let parent_type = self
            .step_type(parent)
            .ok_or(StepRejected::MissingNode(parent.0))?;
        if parent_type.accepts(child) {
            Ok(())
        } else {
            Err(StepRejected::IllegalChild {
                parent: parent_type.tag().to_string(),
                child: child.tag().to_string(),
            })
        }
    }

    pub fn add_child(&mut self, parent: NodeId, step: Step) -> Result<NodeId, StepRejected> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, step)
    }

    /// Inserts `step` at `index` (clamped) among `parent`'s children.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        step: Step,
    ) -> Result<NodeId, StepRejected> {
        self.check_child(parent, step.step_type())?;
        debug!(parent = parent.0, step_type = %step.step_type(), id = %step.id, "adding step");
        let node = self.alloc(parent, step);
        if let Some(parent_node) = self.node_mut(parent) {
            let index = index.min(parent_node.children.len());
            parent_node.children.insert(index, node);
        }
        Ok(node)
    }

    /// Adds a whole subtree (e.g. one returned by [`remove`](Self::remove)).
    /// Only the subtree's root is checked against the nesting rules.
    pub fn insert_tree(
        &mut self,
        parent: NodeId,
        index: usize,
        tree: StepTree,
    ) -> Result<NodeId, StepRejected> {
        let StepTree { step, children } = tree;
        let node = self.insert_child(parent, index, step)?;
        for child in children {
            self.attach_tree(node, child);
        }
        Ok(node)
    }

    /// Re-parents `node` under `new_parent` at `index`.
    pub fn move_step(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        index: usize,
    ) -> Result<(), StepRejected> {
        let step = self.step(node).ok_or(StepRejected::MissingNode(node.0))?;
        if node == self.root {
            return Err(StepRejected::Root(step.id.clone()));
        }
        if node == new_parent || self.is_ancestor(node, new_parent) {
            return Err(StepRejected::IntoOwnSubtree(step.id.clone()));
        }
        self.check_child(new_parent, step.step_type())?;

        let old_parent = self.parent(node);
        if let Some(old) = old_parent.and_then(|p| self.node_mut(p)) {
            old.children.retain(|c| *c != node);
        }
        if let Some(parent_node) = self.node_mut(new_parent) {
            let index = index.min(parent_node.children.len());
            parent_node.children.insert(index, node);
        }
        if let Some(moved) = self.node_mut(node) {
            moved.parent = Some(new_parent);
        }
        debug!(node = node.0, new_parent = new_parent.0, "moved step");
        Ok(())
    }

    /// Removes `node` and its subtree, returning a snapshot of what was removed.
    ///
    /// Removing an invoke also removes links and drops elsewhere in the same
    /// map that read from or write to its result. The root cannot be removed.
    pub fn remove(&mut self, node: NodeId) -> Option<StepTree> {
        if node == self.root {
            return None;
        }
        let removed = self.subtree(node)?;
        let parent = self.parent(node);
        let result_name = removed.step.as_invoke().map(|i| i.result_name.clone());

        self.detach(node);

        if let (Some(result_name), Some(map)) = (result_name, parent) {
            let dependents: Vec<NodeId> = self
                .depth_first_from(map)
                .into_iter()
                .filter(|n| self.refers_to_root(*n, &result_name))
                .collect();
            for dependent in dependents {
                debug!(node = dependent.0, result = %result_name, "removing link to removed invoke");
                self.detach(dependent);
            }
        }
        Some(removed)
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node).and_then(|p| self.node_mut(p)) {
            parent.children.retain(|c| *c != node);
        }
        for n in self.depth_first_from(node) {
            self.nodes[n.0] = None;
        }
    }

    /// Whether a link or drop reads or writes a path rooted at `name`.
    pub fn refers_to_root(&self, node: NodeId, name: &str) -> bool {
        match self.step(node).map(|s| &s.kind) {
            Some(StepKind::Link(link)) => {
                root_of(&link.to) == name
                    || match link.source_path() {
                        Some(from) => root_of(from) == name,
                        None => expression_body(&link.from)
                            .and_then(|expr| variables(expr).ok())
                            .is_some_and(|vars| vars.iter().any(|v| v.root_name() == name)),
                    }
            }
            Some(StepKind::Drop(drop)) => root_of(&drop.path) == name,
            _ => false,
        }
    }

    /// Assigns display line numbers in pre-order, starting at 1.
    ///
    /// The root, links, and everything inside a map stay unnumbered.
    pub fn renumber(&mut self) {
        let mut next = 1u32;
        let mut stack: Vec<(NodeId, bool)> = vec![(self.root, false)];
        while let Some((node, inside_map)) = stack.pop() {
            let Some(step_type) = self.step_type(node) else {
                continue;
            };
            let numbered = node != self.root && !inside_map && step_type != StepType::Link;
            if let Some(step) = self.step_mut(node) {
                step.line_number = if numbered {
                    next += 1;
                    Some(next - 1)
                } else {
                    None
                };
            }
            let child_inside_map = inside_map || step_type == StepType::Map;
            let children: Vec<NodeId> = self.children(node).to_vec();
            stack.extend(children.into_iter().rev().map(|c| (c, child_inside_map)));
        }
    }

    /// The explicit comment, or for a map wrapping exactly one invoke, that
    /// invoke's service id.
    pub fn effective_comment(&self, node: NodeId) -> Option<&str> {
        let step = self.step(node)?;
        if let Some(comment) = step.comment.as_deref() {
            return Some(comment);
        }
        if step.step_type() != StepType::Map {
            return None;
        }
        self.children(node)
            .iter()
            .filter_map(|c| self.step(*c).and_then(Step::as_invoke))
            .exactly_one()
            .ok()
            .map(|invoke| invoke.service_id.as_str())
    }

    /// The case key for a direct child of a switch; `None` for other steps.
    pub fn case_key(&self, node: NodeId) -> Option<CaseKey<'_>> {
        let parent = self.parent(node)?;
        if self.step_type(parent) != Some(StepType::Switch) {
            return None;
        }
        let step = self.step(node)?;
        Some(match step.label.as_deref() {
            Some(label) => CaseKey::Labeled(label),
            None => CaseKey::Default,
        })
    }

    /// `"<description>:<stepId>"` tokens from the root down to `node`.
    pub fn context(&self, node: NodeId) -> Vec<String> {
        let mut chain = self.ancestors(node);
        chain.reverse();
        chain.push(node);
        chain
            .into_iter()
            .filter_map(|n| self.step(n))
            .map(|s| format!("{}:{}", s.description(), s.id))
            .collect()
    }

    /// Relocates a step from a validation context.
    pub fn locate(&self, context: &[String]) -> Option<NodeId> {
        let last = context.last()?;
        let (_, id) = last.rsplit_once(':')?;
        self.find(id)
    }

    /// Direct invoke children of a map.
    pub fn invokes(&self, map: NodeId) -> Vec<NodeId> {
        self.children(map)
            .iter()
            .copied()
            .filter(|c| self.step_type(*c) == Some(StepType::Invoke))
            .collect()
    }

    /// The invoke under `map` whose result is called `result_name`.
    pub fn result_owner(&self, map: NodeId, result_name: &str) -> Option<NodeId> {
        self.invokes(map).into_iter().find(|i| {
            self.step(*i)
                .and_then(Step::as_invoke)
                .is_some_and(|inv| inv.result_name == result_name)
        })
    }

    /// Children as shown to the user: drops that merely discard a sibling
    /// invoke's result are hidden unless the configuration asks for them.
    pub fn visible_children(&self, node: NodeId, config: &EditorConfig) -> Vec<NodeId> {
        let children = self.children(node);
        if config.show_hidden_drops {
            return children.to_vec();
        }
        let result_names: Vec<&str> = self
            .invokes(node)
            .into_iter()
            .filter_map(|i| self.step(i).and_then(Step::as_invoke))
            .map(|i| i.result_name.as_str())
            .collect();
        children
            .iter()
            .copied()
            .filter(|c| match self.step(*c).and_then(Step::as_drop) {
                Some(drop) => !result_names.contains(&root_of(&drop.path)),
                None => true,
            })
            .collect()
    }
}
