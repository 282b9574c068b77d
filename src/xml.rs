//! A plain string-based XML element tree, built by a tolerant tag-soup tokenizer (spec.md
//! §9 design notes: "an implementation may substitute a standard XML parser as long as it
//! produces the same element tree shape: `{label, attrs, children}`").
//!
//! Grounded on `quick-xml`'s pull-reader (`examples/other_examples`
//! `johnstonskj-rust-upnp`'s `quick-xml = "0.23"` manifest dependency): events are
//! consumed one at a time and assembled into an owned tree here, rather than exposed as a
//! streaming API, because the importer (C6) needs to look ahead at a struct's full member
//! list before committing it.

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{DdslError, Result};

/// One XML element: its tag name, attributes in document order, child elements, and any
/// direct text content (unused by the schema dialect spec.md §4.7 names, but kept for
/// parser completeness).
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.tag == tag)
    }
}

/// Parses an XML document into its forest of top-level elements. Most schema files carry
/// exactly one top-level `module`/`struct`/etc., but the tolerant tokenizer does not
/// require a single wrapping root (spec.md §9: "need not handle full XML").
pub fn parse_document(xml: &str) -> Result<Vec<Element>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut roots = Vec::new();

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let el = start_element(&reader, e)?;
                stack.push(el);
            }
            Ok(Event::Empty(ref e)) => {
                let el = start_element(&reader, e)?;
                push_child(&mut stack, &mut roots, el);
            }
            Ok(Event::End(_)) => {
                let el = stack.pop().ok_or_else(|| {
                    DdslError::parse("unmatched closing tag in XML document")
                })?;
                push_child(&mut stack, &mut roots, el);
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape_and_decode(&reader)
                    .map_err(|err| DdslError::parse(format!("XML text decode error: {err}")))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(DdslError::parse(format!(
                    "XML parse error at byte {}: {err}",
                    reader.buffer_position()
                )))
            }
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DdslError::parse("XML document has unclosed elements"));
    }
    Ok(roots)
}

fn push_child(stack: &mut [Element], roots: &mut Vec<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => roots.push(el),
    }
}

fn start_element(reader: &Reader<&[u8]>, e: &quick_xml::events::BytesStart) -> Result<Element> {
    let tag = String::from_utf8_lossy(e.name()).into_owned();
    let mut attrs = IndexMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DdslError::parse(format!("malformed attribute on <{tag}>: {err}")))?;
        let key = String::from_utf8_lossy(attr.key).into_owned();
        let value = attr
            .unescape_and_decode_value(reader)
            .map_err(|err| DdslError::parse(format!("malformed attribute value on <{tag}>: {err}")))?;
        attrs.insert(key, value);
    }
    Ok(Element { tag, attrs, children: Vec::new(), text: String::new() })
}
