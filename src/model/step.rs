use std::fmt;
use uuid::Uuid;

/// The closed set of step types a VM Service is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepType {
    Sequence,
    Map,
    For,
    Switch,
    Throw,
    Catch,
    Finally,
    Break,
    Invoke,
    Link,
    Drop,
}

impl StepType {
    pub const ALL: [StepType; 11] = [
        StepType::Sequence,
        StepType::Map,
        StepType::For,
        StepType::Switch,
        StepType::Throw,
        StepType::Catch,
        StepType::Finally,
        StepType::Break,
        StepType::Invoke,
        StepType::Link,
        StepType::Drop,
    ];

    /// The persisted tag name (lowercase-first type name).
    pub fn tag(self) -> &'static str {
        match self {
            StepType::Sequence => "sequence",
            StepType::Map => "map",
            StepType::For => "for",
            StepType::Switch => "switch",
            StepType::Throw => "throw",
            StepType::Catch => "catch",
            StepType::Finally => "finally",
            StepType::Break => "break",
            StepType::Invoke => "invoke",
            StepType::Link => "link",
            StepType::Drop => "drop",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Steps that may appear in ordinary control flow.
    pub fn is_flow(self) -> bool {
        matches!(
            self,
            StepType::Sequence
                | StepType::Map
                | StepType::For
                | StepType::Switch
                | StepType::Throw
                | StepType::Break
        )
    }

    /// Whether steps of this type own children at all.
    pub fn is_group(self) -> bool {
        !matches!(self, StepType::Break | StepType::Link | StepType::Drop)
    }

    /// The nesting rule: which child types a step of this type accepts.
    pub fn accepts(self, child: StepType) -> bool {
        match self {
            StepType::Sequence => {
                child.is_flow() || matches!(child, StepType::Catch | StepType::Finally)
            }
            StepType::For | StepType::Switch | StepType::Catch | StepType::Finally => {
                child.is_flow()
            }
            StepType::Map => matches!(child, StepType::Invoke | StepType::Link | StepType::Drop),
            StepType::Invoke => matches!(child, StepType::Link | StepType::Drop),
            StepType::Throw => child == StepType::Map,
            StepType::Break | StepType::Link | StepType::Drop => false,
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceStep {
    pub transaction_variable: Option<String>,
    pub nested: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForStep {
    /// Expression yielding the iterated list.
    pub query: String,
    pub variable: String,
    pub index: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchStep {
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrowStep {
    pub code: Option<String>,
    /// A literal, or an expression when it starts with `=`.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchStep {
    pub variable: Option<String>,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeStep {
    pub service_id: String,
    /// Variable under which the invocation's output becomes addressable.
    pub result_name: String,
    pub invocation_order: i32,
    /// `None` for the default runner, `$any`/`$all` modes or a runner id.
    pub target: Option<String>,
    pub asynchronous: bool,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStep {
    pub from: String,
    pub to: String,
    /// Replace a complex target entirely instead of merging into it.
    pub mask: bool,
    pub optional: bool,
    /// `from` holds a literal (or `=` expression) instead of a path.
    pub fixed_value: bool,
}

impl LinkStep {
    /// The source path, or `None` when the link carries a fixed value.
    pub fn source_path(&self) -> Option<&str> {
        (!self.fixed_value).then_some(self.from.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropStep {
    pub path: String,
}

/// Type-specific payload of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Sequence(SequenceStep),
    Map,
    For(ForStep),
    Switch(SwitchStep),
    Throw(ThrowStep),
    Catch(CatchStep),
    Finally,
    Break,
    Invoke(InvokeStep),
    Link(LinkStep),
    Drop(DropStep),
}

impl StepKind {
    pub fn step_type(&self) -> StepType {
        match self {
            StepKind::Sequence(_) => StepType::Sequence,
            StepKind::Map => StepType::Map,
            StepKind::For(_) => StepType::For,
            StepKind::Switch(_) => StepType::Switch,
            StepKind::Throw(_) => StepType::Throw,
            StepKind::Catch(_) => StepType::Catch,
            StepKind::Finally => StepType::Finally,
            StepKind::Break => StepType::Break,
            StepKind::Invoke(_) => StepType::Invoke,
            StepKind::Link(_) => StepType::Link,
            StepKind::Drop(_) => StepType::Drop,
        }
    }

    /// An empty payload for a given type, used by the deserializer.
    pub fn empty(step_type: StepType) -> Self {
        match step_type {
            StepType::Sequence => StepKind::Sequence(SequenceStep::default()),
            StepType::Map => StepKind::Map,
            StepType::For => StepKind::For(ForStep::default()),
            StepType::Switch => StepKind::Switch(SwitchStep::default()),
            StepType::Throw => StepKind::Throw(ThrowStep::default()),
            StepType::Catch => StepKind::Catch(CatchStep::default()),
            StepType::Finally => StepKind::Finally,
            StepType::Break => StepKind::Break,
            StepType::Invoke => StepKind::Invoke(InvokeStep::default()),
            StepType::Link => StepKind::Link(LinkStep::default()),
            StepType::Drop => StepKind::Drop(DropStep::default()),
        }
    }
}

/// A single node of a flow program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: String,
    /// Display name; inside a switch it is the case key.
    pub label: Option<String>,
    pub comment: Option<String>,
    /// Overrides the rendered type name.
    pub name: Option<String>,
    pub disabled: bool,
    /// Assigned by [`StepGraph::renumber`](super::StepGraph::renumber); never persisted.
    pub line_number: Option<u32>,
    pub kind: StepKind,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            id: generate_id(),
            label: None,
            comment: None,
            name: None,
            disabled: false,
            line_number: None,
            kind,
        }
    }

    pub fn sequence() -> Self {
        Self::new(StepKind::Sequence(SequenceStep::default()))
    }

    pub fn map() -> Self {
        Self::new(StepKind::Map)
    }

    pub fn for_each(query: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::new(StepKind::For(ForStep {
            query: query.into(),
            variable: variable.into(),
            index: None,
        }))
    }

    pub fn switch(query: impl Into<String>) -> Self {
        Self::new(StepKind::Switch(SwitchStep {
            query: query.into(),
        }))
    }

    pub fn throw(code: Option<String>, message: Option<String>) -> Self {
        Self::new(StepKind::Throw(ThrowStep { code, message }))
    }

    pub fn catch(types: Vec<String>) -> Self {
        Self::new(StepKind::Catch(CatchStep {
            variable: None,
            types,
        }))
    }

    pub fn finally() -> Self {
        Self::new(StepKind::Finally)
    }

    pub fn break_loop() -> Self {
        Self::new(StepKind::Break)
    }

    /// A call to `service_id` with a freshly generated result name.
    pub fn invoke(service_id: impl Into<String>) -> Self {
        Self::new(StepKind::Invoke(InvokeStep {
            service_id: service_id.into(),
            result_name: generate_result_name(),
            ..InvokeStep::default()
        }))
    }

    pub fn link(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(StepKind::Link(LinkStep {
            from: from.into(),
            to: to.into(),
            ..LinkStep::default()
        }))
    }

    pub fn fixed_value(value: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(StepKind::Link(LinkStep {
            from: value.into(),
            to: to.into(),
            fixed_value: true,
            ..LinkStep::default()
        }))
    }

    pub fn drop(path: impl Into<String>) -> Self {
        Self::new(StepKind::Drop(DropStep { path: path.into() }))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn step_type(&self) -> StepType {
        self.kind.step_type()
    }

    /// Text used to identify the step in validation contexts.
    pub fn description(&self) -> &str {
        self.name
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or_else(|| self.step_type().tag())
    }

    pub fn as_invoke(&self) -> Option<&InvokeStep> {
        match &self.kind {
            StepKind::Invoke(invoke) => Some(invoke),
            _ => None,
        }
    }

    pub fn as_invoke_mut(&mut self) -> Option<&mut InvokeStep> {
        match &mut self.kind {
            StepKind::Invoke(invoke) => Some(invoke),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&LinkStep> {
        match &self.kind {
            StepKind::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn as_link_mut(&mut self) -> Option<&mut LinkStep> {
        match &mut self.kind {
            StepKind::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn as_drop(&self) -> Option<&DropStep> {
        match &self.kind {
            StepKind::Drop(drop) => Some(drop),
            _ => None,
        }
    }
}

/// A fresh step id: 32 lowercase hex characters.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A fresh invoke result name: `result` followed by 32 hex characters.
pub fn generate_result_name() -> String {
    format!("result{}", Uuid::new_v4().simple())
}
