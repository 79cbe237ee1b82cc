use super::reader::{LEGACY_TAG, is_type_attribute, legacy_tag, read_attributes};
use super::writer::{push_escaped, xml_error};
use crate::error::PersistError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

/// Boolean attributes dropped by [`normalize`] when they hold `false`.
const DEFAULT_FALSE: [&str; 6] = [
    "disabled",
    "recache",
    "asynchronous",
    "fixedValue",
    "mask",
    "optional",
];

/// Rewrites a step document into its compact, readable form.
///
/// Legacy `<steps xsi:type="...Foo">` elements become `<foo>`, the `xsi`
/// namespace declaration goes with them, `lineNumber` is removed and the
/// boolean attributes that default to `false` are dropped when they hold it.
/// The result deserializes to the same graph as the input.
pub fn normalize(xml: &str) -> Result<String, PersistError> {
    rewrite(xml, |tag, attributes| {
        if *tag == LEGACY_TAG {
            if let Some((_, value)) = attributes.iter().find(|(key, _)| is_type_attribute(key)) {
                *tag = legacy_tag(value);
            }
        }
        attributes.retain(|(key, value)| {
            !(is_type_attribute(key)
                || key == "xmlns:xsi"
                || key == "lineNumber"
                || (value == "false" && DEFAULT_FALSE.contains(&key.as_str())))
        });
    })
}

/// Replaces every `serviceId="old_id"` in a raw step document without
/// building a graph, returning the new document and the number of changes.
pub fn patch_service_ids(
    xml: &str,
    old_id: &str,
    new_id: &str,
) -> Result<(String, usize), PersistError> {
    let mut count = 0;
    let patched = rewrite(xml, |_, attributes| {
        for (key, value) in attributes.iter_mut() {
            if *key == "serviceId" && *value == old_id {
                *value = new_id.to_string();
                count += 1;
            }
        }
    })?;
    debug!(old = old_id, new = new_id, count, "patched service ids");
    Ok((patched, count))
}

/// Streams `xml` through `edit`, which may rename each element and change
/// its attributes. Closing tags follow the renamed opening tags.
fn rewrite<F>(xml: &str, mut edit: F) -> Result<String, PersistError>
where
    F: FnMut(&mut String, &mut Vec<(String, String)>),
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut open: Vec<String> = Vec::new();
    let mut just_opened = false;

    let mut rebuild = |start: &BytesStart<'_>| -> Result<(String, BytesStart<'static>), PersistError> {
        let mut tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = read_attributes(start)?;
        edit(&mut tag, &mut attributes);
        let mut element = BytesStart::new(tag.clone());
        for (key, value) in &attributes {
            push_escaped(&mut element, key, value);
        }
        Ok((tag, element))
    };

    loop {
        let event = match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => {
                let (tag, element) = rebuild(&start)?;
                open.push(tag);
                Event::Start(element)
            }
            Event::Empty(start) => Event::Empty(rebuild(&start)?.1),
            Event::End(_) => {
                let tag = open
                    .pop()
                    .ok_or_else(|| PersistError::Structure("unexpected closing tag".into()))?;
                // Keeps `<types></types>` from being split by indentation.
                if just_opened {
                    writer
                        .write_event(Event::Text(BytesText::new("")))
                        .map_err(xml_error)?;
                }
                Event::End(BytesEnd::new(tag))
            }
            // Indentation is regenerated; only text inside `types` is data.
            Event::Text(text)
                if open.last().is_none_or(|tag| tag != "types")
                    && text.iter().all(u8::is_ascii_whitespace) =>
            {
                continue;
            }
            Event::Eof => break,
            other => other,
        };
        just_opened = matches!(event, Event::Start(_));
        writer.write_event(event).map_err(xml_error)?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| PersistError::Utf8(e.to_string()))
}
