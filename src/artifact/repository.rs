use crate::model::{Element, INPUT, OUTPUT, Pipeline};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// The declared input and output of a service or interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSignature {
    #[serde(default)]
    pub input: Vec<Element>,
    #[serde(default)]
    pub output: Vec<Element>,
}

impl ServiceSignature {
    pub fn new(input: Vec<Element>, output: Vec<Element>) -> Self {
        Self { input, output }
    }

    /// The signature a service exposes through its pipeline.
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self::new(
            pipeline.input.children().to_vec(),
            pipeline.output.children().to_vec(),
        )
    }

    /// The signature as the two slot elements `input` and `output`.
    ///
    /// When `batch` is set the slots are lists, since a batch invocation
    /// yields one result per runner.
    pub fn as_slots(&self, batch: bool) -> Vec<Element> {
        let mut input = Element::complex(INPUT, self.input.clone());
        let mut output = Element::complex(OUTPUT, self.output.clone());
        input.list = batch;
        output.list = batch;
        vec![input, output]
    }
}

/// Something a repository id can resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Service(ServiceSignature),
    Interface(ServiceSignature),
    /// A shared complex type definition.
    Type(Vec<Element>),
}

/// The hosting repository as seen by the core.
pub trait Repository {
    fn resolve(&self, id: &str) -> Option<Artifact>;

    /// The runner used when an invoke names no target.
    fn service_runner(&self) -> Option<String> {
        None
    }

    /// Whether `target` fans out to several runners (a batch execution).
    fn is_batch_target(&self, target: &str) -> bool {
        InvokeTarget::parse(Some(target)).is_batch()
    }

    /// Targets offered for selection in the editor.
    fn execution_targets(&self) -> Vec<String> {
        Vec::new()
    }

    fn signature(&self, id: &str) -> Option<ServiceSignature> {
        match self.resolve(id)? {
            Artifact::Service(signature) | Artifact::Interface(signature) => Some(signature),
            Artifact::Type(_) => None,
        }
    }
}

impl<R: Repository + ?Sized> Repository for &R {
    fn resolve(&self, id: &str) -> Option<Artifact> {
        (**self).resolve(id)
    }

    fn service_runner(&self) -> Option<String> {
        (**self).service_runner()
    }

    fn is_batch_target(&self, target: &str) -> bool {
        (**self).is_batch_target(target)
    }

    fn execution_targets(&self) -> Vec<String> {
        (**self).execution_targets()
    }
}

/// A repository that resolves nothing; every external lookup is opaque.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRepository;

impl Repository for NoRepository {
    fn resolve(&self, _id: &str) -> Option<Artifact> {
        None
    }
}

/// An in-memory repository, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    artifacts: AHashMap<String, Artifact>,
    targets: Vec<String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, id: &str, signature: ServiceSignature) -> Self {
        self.artifacts
            .insert(id.to_string(), Artifact::Service(signature));
        self
    }

    pub fn with_interface(mut self, id: &str, signature: ServiceSignature) -> Self {
        self.artifacts
            .insert(id.to_string(), Artifact::Interface(signature));
        self
    }

    pub fn with_type(mut self, id: &str, elements: Vec<Element>) -> Self {
        self.artifacts.insert(id.to_string(), Artifact::Type(elements));
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.targets.push(target.to_string());
        self
    }
}

impl Repository for MemoryRepository {
    fn resolve(&self, id: &str) -> Option<Artifact> {
        self.artifacts.get(id).cloned()
    }

    fn execution_targets(&self) -> Vec<String> {
        self.targets.clone()
    }
}

/// Fan-out mode of a clustered invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fan {
    /// The first runner to answer.
    Any,
    /// Every runner; results form a list.
    All,
}

impl Fan {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "$any" => Some(Fan::Any),
            "$all" => Some(Fan::All),
            _ => None,
        }
    }
}

/// The execution mode selected by an invoke's `target` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeTarget {
    Default,
    Cluster { outer: Fan, inner: Option<Fan> },
    Runner(String),
}

impl InvokeTarget {
    /// `None`/empty -> default, `$any`/`$all` with an optional `:$any`/`:$all`
    /// suffix -> cluster, anything else -> an explicit runner id.
    pub fn parse(target: Option<&str>) -> Self {
        let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
            return InvokeTarget::Default;
        };
        let (head, tail) = match target.split_once(':') {
            Some((head, tail)) => (head, Some(tail)),
            None => (target, None),
        };
        match (Fan::parse(head), tail.map(Fan::parse)) {
            (Some(outer), None) => InvokeTarget::Cluster { outer, inner: None },
            (Some(outer), Some(Some(inner))) => InvokeTarget::Cluster {
                outer,
                inner: Some(inner),
            },
            _ => InvokeTarget::Runner(target.to_string()),
        }
    }

    /// Whether any fan-out level collects every runner's result.
    pub fn is_batch(&self) -> bool {
        match self {
            InvokeTarget::Cluster { outer, inner } => {
                *outer == Fan::All || *inner == Some(Fan::All)
            }
            _ => false,
        }
    }
}
