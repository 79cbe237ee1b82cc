use serde::{Deserialize, Serialize};
use std::fmt;

/// Name lookup inside a structure, used when walking paths.
pub trait ElementLookup {
    fn lookup(&self, name: &str) -> Option<&Element>;
}

/// The shape of a pipeline element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    Scalar {
        #[serde(rename = "scalarType")]
        scalar_type: String,
    },
    Complex {
        #[serde(default)]
        children: Vec<Element>,
    },
    /// A complex type defined elsewhere, referenced by id.
    Reference {
        #[serde(rename = "typeId")]
        type_id: String,
    },
}

/// A named field of a pipeline structure or a service signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(flatten)]
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub list: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl Element {
    pub fn scalar(name: impl Into<String>, scalar_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Scalar {
                scalar_type: scalar_type.into(),
            },
            list: false,
            optional: false,
        }
    }

    pub fn complex(name: impl Into<String>, children: Vec<Element>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Complex { children },
            list: false,
            optional: false,
        }
    }

    pub fn reference(name: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Reference {
                type_id: type_id.into(),
            },
            list: false,
            optional: false,
        }
    }

    pub fn as_list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn children(&self) -> &[Element] {
        match &self.kind {
            ElementKind::Complex { children } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Element>> {
        match &mut self.kind {
            ElementKind::Complex { children } => Some(children),
            _ => None,
        }
    }

    pub fn type_reference(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Reference { type_id } => Some(type_id),
            _ => None,
        }
    }

    fn collect_type_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(type_id) = self.type_reference() {
            out.push(type_id);
        }
        for child in self.children() {
            child.collect_type_references(out);
        }
    }

    fn rename_type_reference(&mut self, old_id: &str, new_id: &str) -> usize {
        match &mut self.kind {
            ElementKind::Reference { type_id } if type_id == old_id => {
                *type_id = new_id.to_string();
                1
            }
            ElementKind::Complex { children } => children
                .iter_mut()
                .map(|c| c.rename_type_reference(old_id, new_id))
                .sum(),
            _ => 0,
        }
    }

    fn flatten_into(&self, prefix: &[String], out: &mut Vec<ElementRef>) {
        let mut path = prefix.to_vec();
        path.push(self.name.clone());
        out.push(ElementRef { path: path.clone() });
        for child in self.children() {
            child.flatten_into(&path, out);
        }
    }
}

impl ElementLookup for Element {
    fn lookup(&self, name: &str) -> Option<&Element> {
        self.children().iter().find(|c| c.name == name)
    }
}

impl ElementLookup for Vec<Element> {
    fn lookup(&self, name: &str) -> Option<&Element> {
        self.iter().find(|c| c.name == name)
    }
}

/// The slash path of a pipeline element, slot first: `["input", "age"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef {
    pub path: Vec<String>,
}

impl ElementRef {
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self {
            path: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn slot(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &ElementRef) -> bool {
        other.path.starts_with(&self.path)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path.join("/"))
    }
}

pub const INPUT: &str = "input";
pub const OUTPUT: &str = "output";

/// The input/output contract of a VM Service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Id of an external interface whose signature this service implements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub input: Element,
    pub output: Element,
    #[serde(default)]
    pub input_validated: bool,
    #[serde(default)]
    pub output_validated: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl Pipeline {
    pub fn new(input: Vec<Element>, output: Vec<Element>) -> Self {
        Self {
            interface: None,
            input: Element::complex(INPUT, input),
            output: Element::complex(OUTPUT, output),
            input_validated: false,
            output_validated: false,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&Element> {
        match name {
            INPUT => Some(&self.input),
            OUTPUT => Some(&self.output),
            _ => None,
        }
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Element> {
        match name {
            INPUT => Some(&mut self.input),
            OUTPUT => Some(&mut self.output),
            _ => None,
        }
    }

    /// Resolves a slot-first name path such as `["input", "address", "zip"]`.
    pub fn element_at<S: AsRef<str>>(&self, path: &[S]) -> Option<&Element> {
        let (slot, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.slot(slot.as_ref())?, |element, name| {
                element.lookup(name.as_ref())
            })
    }

    /// Every element of both slots (slots excluded), pre-order.
    pub fn flatten(&self) -> Vec<ElementRef> {
        let mut out = Vec::new();
        for slot in [&self.input, &self.output] {
            let prefix = vec![slot.name.clone()];
            for child in slot.children() {
                child.flatten_into(&prefix, &mut out);
            }
        }
        out
    }

    /// Removes the element at `path`; slots themselves cannot be removed.
    pub fn remove_element(&mut self, path: &ElementRef) -> Option<Element> {
        let (last, parents) = path.path.split_last()?;
        let (slot, between) = parents.split_first()?;
        let mut container = self.slot_mut(slot)?;
        for name in between {
            container = container
                .children_mut()?
                .iter_mut()
                .find(|c| &c.name == name)?;
        }
        let children = container.children_mut()?;
        let position = children.iter().position(|c| &c.name == last)?;
        Some(children.remove(position))
    }

    /// Complex-type references inside both slots, pre-order, with repeats.
    pub fn type_references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.input.collect_type_references(&mut out);
        self.output.collect_type_references(&mut out);
        out
    }

    pub fn rename_type_reference(&mut self, old_id: &str, new_id: &str) -> usize {
        self.input.rename_type_reference(old_id, new_id)
            + self.output.rename_type_reference(old_id, new_id)
    }
}

impl ElementLookup for Pipeline {
    fn lookup(&self, name: &str) -> Option<&Element> {
        self.slot(name)
    }
}

/// Collects the type references of a standalone element list.
pub fn type_references_of(elements: &[Element]) -> Vec<&str> {
    let mut out = Vec::new();
    for element in elements {
        element.collect_type_references(&mut out);
    }
    out
}
