use super::writer::xml_error;
use crate::error::PersistError;
use crate::model::{Step, StepGraph, StepKind, StepTree, StepType};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

/// The generic tag of the legacy form, typed by `xsi:type`.
pub(crate) const LEGACY_TAG: &str = "steps";

/// Reads a step document in either the dedicated-tag or the legacy
/// `xsi:type` form, then renumbers the result.
pub fn deserialize(bytes: &[u8]) -> Result<StepGraph, PersistError> {
    let text = std::str::from_utf8(bytes).map_err(|e| PersistError::Utf8(e.to_string()))?;
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<StepTree> = Vec::new();
    let mut root: Option<StepTree> = None;
    let mut exception: Option<String> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) if start.name().as_ref() == b"types" => {
                require_catch(&stack)?;
                exception = Some(String::new());
            }
            Event::Empty(start) if start.name().as_ref() == b"types" => {
                push_exception(&mut stack, String::new())?;
            }
            Event::Start(start) => {
                stack.push(StepTree::leaf(read_step(&start)?));
            }
            Event::Empty(start) => {
                let tree = StepTree::leaf(read_step(&start)?);
                attach(&mut stack, &mut root, tree)?;
            }
            Event::End(end) if end.name().as_ref() == b"types" => {
                let text = exception.take().unwrap_or_default();
                push_exception(&mut stack, text)?;
            }
            Event::End(_) => {
                let tree = stack
                    .pop()
                    .ok_or_else(|| PersistError::Structure("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, tree)?;
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(xml_error)?;
                match exception.as_mut() {
                    Some(buffer) => buffer.push_str(&value),
                    None if value.trim().is_empty() => {}
                    None => {
                        return Err(PersistError::Structure(format!(
                            "unexpected text '{}'",
                            value
                        )));
                    }
                }
            }
            Event::CData(data) => {
                if let Some(buffer) = exception.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if !stack.is_empty() {
        return Err(PersistError::Structure("document ends inside a step".into()));
    }
    let root = root.ok_or_else(|| PersistError::Structure("document has no root step".into()))?;
    if root.step.step_type() != StepType::Sequence {
        return Err(PersistError::Structure(format!(
            "root step must be a sequence, found '{}'",
            root.step.step_type()
        )));
    }

    let mut graph = StepGraph::from_tree(root);
    graph.renumber();
    Ok(graph)
}

fn attach(
    stack: &mut [StepTree],
    root: &mut Option<StepTree>,
    tree: StepTree,
) -> Result<(), PersistError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(tree),
        None if root.is_none() => *root = Some(tree),
        None => return Err(PersistError::Structure("more than one root step".into())),
    }
    Ok(())
}

fn require_catch(stack: &[StepTree]) -> Result<(), PersistError> {
    match stack.last().map(|t| t.step.step_type()) {
        Some(StepType::Catch) => Ok(()),
        _ => Err(PersistError::Structure(
            "'types' is only allowed inside 'catch'".into(),
        )),
    }
}

fn push_exception(stack: &mut [StepTree], exception: String) -> Result<(), PersistError> {
    require_catch(stack)?;
    if let Some(StepKind::Catch(catch)) = stack.last_mut().map(|t| &mut t.step.kind) {
        catch.types.push(exception);
    }
    Ok(())
}

/// The dedicated tag for a legacy `xsi:type` value: the local type name with
/// its first letter lowercased, e.g. `vm.steps.Invoke` -> `invoke`.
pub(crate) fn legacy_tag(xsi_type: &str) -> String {
    let local = xsi_type
        .rsplit(['.', ':'])
        .next()
        .unwrap_or(xsi_type)
        .trim();
    let mut chars = local.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether an attribute names the legacy type (`xsi:type` or any `*:type`).
pub(crate) fn is_type_attribute(key: &str) -> bool {
    key.rsplit_once(':').is_some_and(|(_, local)| local == "type")
}

/// Namespace declarations and prefixed attributes carry no step data.
pub(crate) fn is_namespace_attribute(key: &str) -> bool {
    key == "xmlns" || key.contains(':')
}

/// Decoded `(key, value)` pairs of an element.
pub(crate) fn read_attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, PersistError> {
    start
        .attributes()
        .map(|attribute| {
            let attribute = attribute.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
            Ok((key, value))
        })
        .collect()
}

fn read_step(start: &BytesStart<'_>) -> Result<Step, PersistError> {
    let attributes = read_attributes(start)?;
    let raw_tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let tag = if raw_tag == LEGACY_TAG {
        attributes
            .iter()
            .find(|(key, _)| is_type_attribute(key))
            .map(|(_, value)| legacy_tag(value))
            .ok_or_else(|| PersistError::UnknownStep(raw_tag.clone()))?
    } else {
        raw_tag
    };
    let step_type = StepType::from_tag(&tag).ok_or_else(|| PersistError::UnknownStep(tag.clone()))?;

    let mut step = Step::new(StepKind::empty(step_type));
    for (key, value) in attributes {
        if key == "lineNumber" || is_namespace_attribute(&key) {
            continue;
        }
        apply_attribute(&mut step, &tag, &key, value)?;
    }
    Ok(step)
}

fn apply_attribute(
    step: &mut Step,
    tag: &str,
    key: &str,
    value: String,
) -> Result<(), PersistError> {
    let invalid = |value: &str| PersistError::InvalidAttribute {
        tag: tag.to_string(),
        attribute: key.to_string(),
        value: value.to_string(),
    };
    let boolean = |value: &str| match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(value)),
    };
    let integer = |value: &str| value.parse::<i32>().map_err(|_| invalid(value));

    match key {
        "id" => step.id = value,
        "label" => step.label = Some(value),
        "comment" => step.comment = Some(value),
        "name" => step.name = Some(value),
        "disabled" => step.disabled = boolean(&value)?,
        _ => match (&mut step.kind, key) {
            (StepKind::Sequence(s), "transactionVariable") => s.transaction_variable = Some(value),
            (StepKind::Sequence(s), "step") => s.nested = boolean(&value)?,
            (StepKind::For(f), "query") => f.query = value,
            (StepKind::For(f), "variable") => f.variable = value,
            (StepKind::For(f), "index") => f.index = Some(value),
            (StepKind::Switch(s), "query") => s.query = value,
            (StepKind::Throw(t), "code") => t.code = Some(value),
            (StepKind::Throw(t), "message") => t.message = Some(value),
            (StepKind::Catch(c), "variable") => c.variable = Some(value),
            (StepKind::Invoke(i), "serviceId") => i.service_id = value,
            (StepKind::Invoke(i), "resultName") => i.result_name = value,
            (StepKind::Invoke(i), "invocationOrder") => i.invocation_order = integer(&value)?,
            (StepKind::Invoke(i), "target") => i.target = Some(value),
            (StepKind::Invoke(i), "asynchronous") => i.asynchronous = boolean(&value)?,
            (StepKind::Invoke(i), "x") => i.x = integer(&value)?,
            (StepKind::Invoke(i), "y") => i.y = integer(&value)?,
            (StepKind::Link(l), "from") => l.from = value,
            (StepKind::Link(l), "to") => l.to = value,
            (StepKind::Link(l), "mask") => l.mask = boolean(&value)?,
            (StepKind::Link(l), "optional") => l.optional = boolean(&value)?,
            (StepKind::Link(l), "fixedValue") => l.fixed_value = boolean(&value)?,
            (StepKind::Drop(d), "path") => d.path = value,
            _ => trace!(tag, attribute = key, "ignoring attribute"),
        },
    }
    Ok(())
}
