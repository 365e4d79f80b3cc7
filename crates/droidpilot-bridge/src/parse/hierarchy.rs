//! Parser for uiautomator XML hierarchy dumps.

use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use droidpilot_core::element::{Bounds, UiElement};
use droidpilot_core::prelude::*;

static BOUNDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").unwrap());

/// Parse a `uiautomator dump` XML document into an element tree.
///
/// Returns `None` when the document carries no `<node>` elements, which
/// happens on secure surfaces and during window transitions. Malformed XML
/// is a protocol error; the dump either parses or it does not.
pub fn parse_hierarchy_xml(xml: &str) -> Result<Option<UiElement>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    // Completed top-level nodes; uiautomator emits one per display.
    let mut roots: Vec<UiElement> = Vec::new();
    let mut stack: Vec<UiElement> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"node" => {
                stack.push(element_from_attributes(e)?);
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"node" => {
                let element = element_from_attributes(e)?;
                attach(&mut stack, &mut roots, element);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"node" => {
                let Some(element) = stack.pop() else {
                    return Err(Error::protocol("unbalanced </node> in hierarchy dump"));
                };
                attach(&mut stack, &mut roots, element);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::protocol(format!("malformed hierarchy XML: {e}")));
            }
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(Error::protocol("truncated hierarchy dump"));
    }
    // The default display is listed first.
    Ok(roots.into_iter().next())
}

fn attach(stack: &mut [UiElement], roots: &mut Vec<UiElement>, element: UiElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

fn element_from_attributes(start: &BytesStart<'_>) -> Result<UiElement> {
    let mut element = UiElement::default();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::protocol(format!("bad node attribute: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::protocol(format!("bad node attribute value: {e}")))?;
        let value = value.as_ref();
        match attr.key.as_ref() {
            b"text" => element.text = non_empty(value),
            b"content-desc" => element.accessible_name = non_empty(value),
            b"class" => element.class = non_empty(value),
            b"resource-id" => element.resource_id = non_empty(value),
            b"hint" => element.hint = non_empty(value),
            b"bounds" => element.bounds = parse_bounds(value),
            b"clickable" => element.clickable = value == "true",
            b"long-clickable" => element.long_clickable = value == "true",
            b"enabled" => element.enabled = value == "true",
            b"focusable" => element.focusable = value == "true",
            b"focused" => element.focused = value == "true",
            b"scrollable" => element.scrollable = value == "true",
            _ => {}
        }
    }
    Ok(element)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse the "[left,top][right,bottom]" bounds attribute.
pub fn parse_bounds(value: &str) -> Option<Bounds> {
    let caps = BOUNDS_RE.captures(value)?;
    Some(Bounds::new(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
        caps[4].parse().ok()?,
    ))
}
