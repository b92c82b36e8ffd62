//! Generic markup tree and its XML text form
//!
//! The codecs never touch XML text directly. They walk an [`Element`] tree,
//! which is produced from text by [`parse`] and turned back into text by
//! [`to_xml_string`]. Attribute handling goes through [`AttributeReader`],
//! which records every attribute a codec asks for so that leftovers can be
//! rejected once the element's schema has been consumed.

use crate::error::{AttributeProblem, Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::collections::HashSet;
use std::str::FromStr;

/// Tag given to comment nodes when comments are kept
pub const COMMENT_TAG: &str = "#comment";

/// Options for turning XML text into an [`Element`] tree
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Drop comments instead of keeping them as [`COMMENT_TAG`] children
    pub remove_comments: bool,
    /// Trim whitespace around text content
    pub trim_text: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            remove_comments: true,
            trim_text: true,
        }
    }
}

/// A markup node: tag, ordered attributes, ordered children and text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    /// Create an element with no attributes, children or text
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder form of [`Element::set_attribute`]
    pub fn with_attribute(mut self, name: &str, value: impl ToString) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder form of setting [`Element::text`]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set an attribute, replacing the value if the name already exists
    pub fn set_attribute(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Look up an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Append a child element
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Start consuming this element's attributes
    pub fn attribute_reader(&self) -> AttributeReader<'_> {
        AttributeReader {
            element: self,
            consumed: HashSet::new(),
        }
    }

    /// Fail with a format error unless the tag is `tag`
    pub fn expect_tag(&self, tag: &str) -> Result<()> {
        if self.tag == tag {
            Ok(())
        } else {
            Err(Error::format(
                &self.tag,
                format!("expected <{}> element", tag),
            ))
        }
    }
}

/// Allow-list view over an element's attributes
///
/// Each lookup marks the name as recognized, whether or not the attribute is
/// present. [`AttributeReader::finish`] then fails if the element carries any
/// attribute that was never looked up.
pub struct AttributeReader<'a> {
    element: &'a Element,
    consumed: HashSet<&'a str>,
}

impl<'a> AttributeReader<'a> {
    pub fn optional_str(&mut self, name: &'a str) -> Option<&'a str> {
        self.consumed.insert(name);
        self.element.attribute(name)
    }

    pub fn required_str(&mut self, name: &'a str) -> Result<&'a str> {
        self.optional_str(name)
            .ok_or_else(|| self.error(name, AttributeProblem::Missing))
    }

    pub fn optional<T: FromStr>(&mut self, name: &'a str) -> Result<Option<T>> {
        match self.optional_str(name) {
            None => Ok(None),
            Some(text) => text
                .parse()
                .map(Some)
                .map_err(|_| self.error(name, AttributeProblem::Invalid(text.to_string()))),
        }
    }

    pub fn required<T: FromStr>(&mut self, name: &'a str) -> Result<T> {
        let text = self.required_str(name)?;
        text.parse()
            .map_err(|_| self.error(name, AttributeProblem::Invalid(text.to_string())))
    }

    /// Reject any attribute that was not looked up
    pub fn finish(self) -> Result<()> {
        let leftover: Vec<String> = self
            .element
            .attributes
            .iter()
            .filter(|(k, _)| !self.consumed.contains(k.as_str()))
            .map(|(k, _)| k.clone())
            .collect();

        if leftover.is_empty() {
            Ok(())
        } else {
            Err(Error::UnexpectedAttribute {
                tag: self.element.tag.clone(),
                names: leftover,
            })
        }
    }

    fn error(&self, name: &str, problem: AttributeProblem) -> Error {
        Error::Attribute {
            tag: self.element.tag.clone(),
            name: name.to_string(),
            problem,
        }
    }
}

fn xml_error(err: impl std::fmt::Display) -> Error {
    Error::Xml(err.to_string())
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(xml_error)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(utf8(start.name().as_ref())?);
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value().map_err(xml_error)?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

/// Attach a finished element to its parent, or make it the root
fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(Error::Xml(format!(
            "second root element <{}>",
            element.tag
        ))),
    }
}

fn append_text(stack: &mut [Element], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(element) => {
            element.text.get_or_insert_with(String::new).push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::Xml("text outside the root element".to_string())),
    }
}

/// Parse XML text into an element tree
pub fn parse(input: &str, config: &ParseConfig) -> Result<Element> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(config.trim_text);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Xml("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                append_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let text = utf8(&data.into_inner())?;
                append_text(&mut stack, &text)?;
            }
            Event::Comment(comment) => {
                // Comments outside the root element are always dropped
                if let Some(parent) = stack.last_mut().filter(|_| !config.remove_comments) {
                    let text = utf8(&comment.into_inner())?;
                    parent.push(Element::new(COMMENT_TAG).with_text(text));
                }
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Xml(format!("unclosed element <{}>", open.tag)));
    }
    root.ok_or_else(|| Error::Xml("document has no root element".to_string()))
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    if element.tag == COMMENT_TAG {
        let text = element.text.as_deref().unwrap_or_default();
        if text.contains("--") || text.ends_with('-') {
            return Err(Error::Xml(format!("comment text '{}' cannot be written", text)));
        }
        return writer
            .write_event(Event::Comment(BytesText::from_escaped(text)))
            .map_err(xml_error);
    }

    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }

    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
        .map_err(xml_error)
}

/// Serialize an element tree as a pretty-printed UTF-8 document with an
/// XML declaration
pub fn to_xml_string(root: &Element, indent: usize) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', indent);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    write_element(&mut writer, root)?;

    let mut output = utf8(&writer.into_inner())?;
    output.push('\n');
    Ok(output)
}
