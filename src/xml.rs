//! Minimal XML element tree over quick-xml
//!
//! The wire envelope and the block wire nodes only need elements,
//! attributes, text and top-level comments, so the reader collapses the
//! event stream into an owned `XmlElement` tree and the writer wraps
//! `quick_xml::Writer` with the few event shapes the codecs emit.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{TranscodeError, TranscodeResult};

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn has_elements(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Concatenated text content of the direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }
}

/// A parsed document: the comments before the root and the root element
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub comments: Vec<String>,
    pub root: XmlElement,
}

fn malformed(e: impl std::fmt::Display) -> TranscodeError {
    TranscodeError::MalformedDocument(format!("Invalid XML Contents: {}", e))
}

fn element_from_start(start: &BytesStart) -> TranscodeResult<XmlElement> {
    let name = String::from_utf8(start.name().as_ref().to_vec()).map_err(malformed)?;
    let mut element = XmlElement::new(name);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = String::from_utf8(attribute.key.as_ref().to_vec()).map_err(malformed)?;
        let value = attribute.unescape_value().map_err(malformed)?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

/// Parse a document into an element tree
///
/// Text and CDATA are kept untrimmed and adjacent pieces are merged.
pub fn parse_document(xml: &str) -> TranscodeResult<XmlDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut comments = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(malformed("content after the root element"));
                }
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None if root.is_none() => root = Some(element),
                    None => return Err(malformed("content after the root element")),
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| malformed("unexpected closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(malformed)?;
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&text);
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned()).map_err(malformed)?;
                match stack.last_mut() {
                    Some(parent) => parent.push_text(&text),
                    None => return Err(malformed("character data outside the root element")),
                }
            }
            Event::Comment(comment) => {
                if stack.is_empty() && root.is_none() {
                    let text = comment.unescape().map_err(malformed)?;
                    comments.push(text.trim().to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(malformed("unclosed element"));
    }

    let root = root.ok_or_else(|| malformed("no root element"))?;
    Ok(XmlDocument { comments, root })
}

/// Streaming writer producing the wire XML
pub struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn emit(&mut self, event: Event) -> TranscodeResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| TranscodeError::MalformedDocument(format!("Failed to write XML: {}", e)))
    }

    pub fn declaration(&mut self) -> TranscodeResult<()> {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub fn comment(&mut self, text: &str) -> TranscodeResult<()> {
        self.emit(Event::Comment(BytesText::from_escaped(format!(" {} ", text))))
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> TranscodeResult<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.emit(Event::Start(start))
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> TranscodeResult<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.emit(Event::Empty(start))
    }

    pub fn end(&mut self, name: &str) -> TranscodeResult<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    pub fn text(&mut self, text: &str) -> TranscodeResult<()> {
        self.emit(Event::Text(BytesText::new(text)))
    }

    /// Write text as CDATA, splitting around any `]]>` it contains
    pub fn cdata(&mut self, text: &str) -> TranscodeResult<()> {
        let pieces: Vec<&str> = text.split("]]>").collect();
        let last = pieces.len() - 1;

        for (index, piece) in pieces.iter().enumerate() {
            let prefix = if index > 0 { ">" } else { "" };
            let suffix = if index < last { "]]" } else { "" };
            let section = format!("{}{}{}", prefix, piece, suffix);
            self.emit(Event::CData(BytesCData::new(section)))?;
        }
        Ok(())
    }

    /// Element holding a single CDATA section
    pub fn cdata_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> TranscodeResult<()> {
        self.start(name, attributes)?;
        self.cdata(text)?;
        self.end(name)
    }

    pub fn finish(self) -> TranscodeResult<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| TranscodeError::MalformedDocument(format!("Failed to write XML: {}", e)))
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_elements_attributes_and_text() {
        let xml = r#"<?xml version="1.0"?>
<!-- first -->
<data><string name="a/b" key="seo"><![CDATA[Hello & <b>bye</b>]]></string><source>abc</source></data>"#;
        let doc = parse_document(xml).unwrap();

        assert_eq!(doc.comments, vec!["first"]);
        assert_eq!(doc.root.name, "data");
        let strings: Vec<&XmlElement> = doc.root.elements().collect();
        assert_eq!(strings.len(), 2);
        assert_eq!(strings[0].attribute("name"), Some("a/b"));
        assert_eq!(strings[0].attribute("key"), Some("seo"));
        assert_eq!(strings[0].text(), "Hello & <b>bye</b>");
        assert_eq!(strings[1].text(), "abc");
    }

    #[test]
    fn test_escaped_text_is_unescaped() {
        let doc = parse_document("<a title=\"x &amp; y\">1 &lt; 2</a>").unwrap();
        assert_eq!(doc.root.attribute("title"), Some("x & y"));
        assert_eq!(doc.root.text(), "1 < 2");
    }

    #[test]
    fn test_unclosed_element_is_malformed() {
        assert!(matches!(
            parse_document("<data><string>"),
            Err(TranscodeError::MalformedDocument(_))
        ));
        assert!(matches!(
            parse_document("not xml at all"),
            Err(TranscodeError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_cdata_split_survives_round_trip() {
        let mut writer = XmlWriter::new();
        writer.cdata_element("v", &[], "a]]>b]]>c").unwrap();
        let xml = writer.finish().unwrap();

        assert_eq!(xml, "<v><![CDATA[a]]]]><![CDATA[>b]]]]><![CDATA[>c]]></v>");
        assert_eq!(parse_document(&xml).unwrap().root.text(), "a]]>b]]>c");
    }

    #[test]
    fn test_writer_escapes_attributes() {
        let mut writer = XmlWriter::new();
        writer.empty("node", &[("name", "a\"b<c")]).unwrap();
        let xml = writer.finish().unwrap();

        let doc = parse_document(&xml).unwrap();
        assert_eq!(doc.root.attribute("name"), Some("a\"b<c"));
        assert!(doc.root.children.is_empty());
    }
}
