use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

/// What a validation message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// A colliding step id was replaced.
    DuplicateId,
    IllegalNesting,
    MissingAttribute,
    ParseError,
    /// A link or drop end that no longer resolves.
    UnresolvedReference,
    OrderingViolation,
    DuplicateCase,
    /// A step that is only legal inside a certain ancestor.
    Misplaced,
    UnknownTarget,
    UnknownService,
    /// A path whose meaning depends on a runtime-evaluated index.
    RuntimeIndex,
}

/// One finding of a validation pass.
///
/// `context` holds `"<description>:<stepId>"` tokens from the root down to the
/// offending step; [`StepGraph::locate`](crate::model::StepGraph::locate)
/// turns it back into a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationMessage {
    pub severity: Severity,
    pub kind: MessageKind,
    pub message: String,
    pub context: Vec<String>,
}

impl ValidationMessage {
    pub fn new(
        severity: Severity,
        kind: MessageKind,
        message: impl Into<String>,
        context: Vec<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            context,
        }
    }

    pub fn info(kind: MessageKind, message: impl Into<String>, context: Vec<String>) -> Self {
        Self::new(Severity::Info, kind, message, context)
    }

    pub fn warning(kind: MessageKind, message: impl Into<String>, context: Vec<String>) -> Self {
        Self::new(Severity::Warning, kind, message, context)
    }

    pub fn error(kind: MessageKind, message: impl Into<String>, context: Vec<String>) -> Self {
        Self::new(Severity::Error, kind, message, context)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context.join(" > "))?;
        }
        Ok(())
    }
}
