use crate::error::PersistError;
use crate::model::{NodeId, Step, StepGraph, StepKind};
use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use std::borrow::Cow;

pub(crate) fn xml_error(error: impl std::fmt::Display) -> PersistError {
    PersistError::Xml(error.to_string())
}

/// Pushes an attribute whose tabs and line breaks are written as character
/// references, since XML readers normalize them to spaces in attribute values.
pub(crate) fn push_escaped(element: &mut BytesStart<'_>, key: &str, value: &str) {
    let escaped = escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;");
    element.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    });
}

/// Writes the step tree as an XML document rooted at the root sequence.
///
/// Every attribute is written, default-valued booleans included; use
/// [`serialize_pretty`](super::serialize_pretty) for the compact form.
pub fn serialize(graph: &StepGraph) -> Result<Vec<u8>, PersistError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    write_step(&mut writer, graph, graph.root())?;
    Ok(writer.into_inner())
}

fn write_step(
    writer: &mut Writer<Vec<u8>>,
    graph: &StepGraph,
    node: NodeId,
) -> Result<(), PersistError> {
    let Some(step) = graph.step(node) else {
        return Ok(());
    };
    let tag = step.step_type().tag();
    let mut start = BytesStart::new(tag);
    for (key, value) in attributes(step) {
        push_escaped(&mut start, key, &value);
    }

    let types: &[String] = match &step.kind {
        StepKind::Catch(catch) => &catch.types,
        _ => &[],
    };
    let children = graph.children(node);
    if types.is_empty() && children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }

    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for exception in types {
        writer
            .write_event(Event::Start(BytesStart::new("types")))
            .map_err(xml_error)?;
        writer
            .write_event(Event::Text(BytesText::from_escaped(
                escape(exception).replace('\r', "&#13;"),
            )))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("types")))
            .map_err(xml_error)?;
    }
    for child in children {
        write_step(writer, graph, *child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(xml_error)
}

/// Attributes in document order: common ones first, then per type.
fn attributes(step: &Step) -> Vec<(&'static str, String)> {
    let mut out = vec![("id", step.id.clone())];
    push_optional(&mut out, "label", &step.label);
    push_optional(&mut out, "comment", &step.comment);
    push_optional(&mut out, "name", &step.name);
    out.push(("disabled", step.disabled.to_string()));

    match &step.kind {
        StepKind::Sequence(sequence) => {
            push_optional(&mut out, "transactionVariable", &sequence.transaction_variable);
            out.push(("step", sequence.nested.to_string()));
        }
        StepKind::For(each) => {
            out.push(("query", each.query.clone()));
            out.push(("variable", each.variable.clone()));
            push_optional(&mut out, "index", &each.index);
        }
        StepKind::Switch(switch) => out.push(("query", switch.query.clone())),
        StepKind::Throw(throw) => {
            push_optional(&mut out, "code", &throw.code);
            push_optional(&mut out, "message", &throw.message);
        }
        StepKind::Catch(catch) => push_optional(&mut out, "variable", &catch.variable),
        StepKind::Invoke(invoke) => {
            out.push(("serviceId", invoke.service_id.clone()));
            out.push(("resultName", invoke.result_name.clone()));
            out.push(("invocationOrder", invoke.invocation_order.to_string()));
            push_optional(&mut out, "target", &invoke.target);
            out.push(("asynchronous", invoke.asynchronous.to_string()));
            out.push(("x", invoke.x.to_string()));
            out.push(("y", invoke.y.to_string()));
        }
        StepKind::Link(link) => {
            out.push(("from", link.from.clone()));
            out.push(("to", link.to.clone()));
            out.push(("mask", link.mask.to_string()));
            out.push(("optional", link.optional.to_string()));
            out.push(("fixedValue", link.fixed_value.to_string()));
        }
        StepKind::Drop(drop) => out.push(("path", drop.path.clone())),
        StepKind::Map | StepKind::Finally | StepKind::Break => {}
    }
    out
}

fn push_optional(out: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        out.push((key, value.clone()));
    }
}
