//! Content document codec
//!
//! Turns a content tree into the wire document sent for translation and
//! merges a translated wire document back into a tree.
//!
//! # Wire format
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!-- smartling.translate_paths = data/string -->
//! ...
//! <data>
//!   <string name="entity/post_title" key="title"><![CDATA[Hello]]></string>
//!   <string name="entity/post_content"><gutenbergBlock .../></string>
//!   <source><![CDATA[eyJlbnRpdHkiOnsicG9zdF90aXRsZSI6...]]></source>
//! </data>
//! ```
//!
//! `source` carries the complete untranslated tree. Decoding starts from it,
//! so fields that were filtered out on the way out come back unchanged.
//!
//! # Example
//!
//! ```ignore
//! let codec = ContentDocumentCodec::new(TranscoderConfig::default());
//! let xml = codec.encode_to_xml(&tree)?;
//! // ... xml goes through translation ...
//! let translated_tree = codec.decode_from_xml(&translated_xml)?;
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::block::codec::BLOCK_NODE;
use crate::block::{BlockCodec, BlockNode, MaskRegistry, has_blocks};
use crate::config::TranscoderConfig;
use crate::error::{TranscodeError, TranscodeResult};
use crate::filter::{FieldFilter, restore_on_inbound};
use crate::flatten::{FlatField, flatten, flatten_nodes, structurize_nodes};
use crate::tree::Node;
use crate::xml::{XmlWriter, parse_document};

/// Processing directives written ahead of the root element
pub const DIRECTIVES: [&str; 4] = [
    "smartling.translate_paths = data/string",
    "smartling.string_format_paths = html : data/string",
    "smartling.source_key_paths = data/{string.key}",
    "smartling.variants_enabled = true",
];

const ROOT_NODE: &str = "data";
const STRING_NODE: &str = "string";
const SOURCE_NODE: &str = "source";

fn generator_directive() -> String {
    format!("content-transcoder v. {}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldPayload {
    Text(String),
    Blocks(Vec<BlockNode>),
}

/// One translatable field on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct WireField {
    pub path: String,
    pub key: Option<String>,
    pub payload: FieldPayload,
}

impl WireField {
    pub fn text(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: None,
            payload: FieldPayload::Text(value.into()),
        }
    }
}

/// Translatable fields plus the encoded source snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct WireDocument {
    pub directives: Vec<String>,
    pub fields: Vec<WireField>,
    pub source: String,
}

impl WireDocument {
    pub fn to_xml(&self) -> TranscodeResult<String> {
        let mut writer = XmlWriter::new();
        writer.declaration()?;
        writer.text("\n")?;
        for directive in &self.directives {
            writer.comment(directive)?;
            writer.text("\n")?;
        }

        writer.start(ROOT_NODE, &[])?;
        for field in &self.fields {
            let mut attributes = vec![("name", field.path.as_str())];
            if let Some(key) = &field.key {
                attributes.push(("key", key.as_str()));
            }

            match &field.payload {
                FieldPayload::Text(text) => writer.cdata_element(STRING_NODE, &attributes, text)?,
                FieldPayload::Blocks(nodes) => {
                    writer.start(STRING_NODE, &attributes)?;
                    for node in nodes {
                        node.write_xml(&mut writer)?;
                    }
                    writer.end(STRING_NODE)?;
                }
            }
        }
        writer.cdata_element(SOURCE_NODE, &[], &self.source)?;
        writer.end(ROOT_NODE)?;

        writer.finish()
    }

    pub fn from_xml(xml: &str) -> TranscodeResult<Self> {
        let document = parse_document(xml)?;
        if document.root.name != ROOT_NODE {
            return Err(TranscodeError::MalformedDocument(format!(
                "Unexpected root element '{}'",
                document.root.name
            )));
        }

        let mut fields = Vec::new();
        let mut source = None;

        for element in document.root.elements() {
            match element.name.as_str() {
                STRING_NODE => {
                    let Some(path) = element.attribute("name") else {
                        warn!("Skipping string node without a name");
                        continue;
                    };

                    let payload = if element.has_elements() {
                        let mut nodes = Vec::new();
                        for child in element.elements() {
                            if child.name == BLOCK_NODE {
                                nodes.push(BlockNode::from_xml(child)?);
                            } else {
                                warn!("Skipping unexpected node '{}' in field '{}'", child.name, path);
                            }
                        }
                        FieldPayload::Blocks(nodes)
                    } else {
                        FieldPayload::Text(element.text())
                    };

                    fields.push(WireField {
                        path: path.to_string(),
                        key: element.attribute("key").map(str::to_string),
                        payload,
                    });
                }
                SOURCE_NODE => source = Some(element.text()),
                other => debug!("Ignoring unexpected node '{}'", other),
            }
        }

        let source = source
            .ok_or_else(|| TranscodeError::MalformedDocument("Missing source node".to_string()))?;

        Ok(WireDocument {
            directives: document.comments,
            fields,
            source,
        })
    }
}

/// Encode a tree as base64 JSON, wrapped at `line_width` columns
pub fn encode_source(tree: &Node, line_width: usize) -> TranscodeResult<String> {
    if line_width == 0 {
        return Err(TranscodeError::ConfigurationError(
            "source_line_width must be greater than zero".to_string(),
        ));
    }

    let encoded = STANDARD.encode(tree.to_json_string()?);
    let lines: Vec<String> = encoded
        .as_bytes()
        .chunks(line_width)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect();
    Ok(lines.join("\n"))
}

/// Decode a source snapshot, ignoring any whitespace in it
pub fn decode_source(source: &str) -> TranscodeResult<Node> {
    let compact: String = source.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(TranscodeError::MalformedDocument("Empty source node".to_string()));
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| TranscodeError::MalformedDocument(format!("Undecodable source: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TranscodeError::MalformedDocument(format!("Undecodable source: {}", e)))
}

/// Numeric value of a purely numeric string
fn numeric_value(text: &str) -> Option<Node> {
    let looks_numeric = !text.is_empty()
        && text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !looks_numeric {
        return None;
    }

    if let Ok(integer) = text.parse::<i64>() {
        return Some(Node::from(integer));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Node::Number)
}

fn collapse_single_element(value: &mut Node) {
    if let Node::Sequence(items) = value {
        if items.len() == 1 && !items[0].is_container() {
            let item = items.remove(0);
            *value = item;
        }
    }
}

fn is_entity_shaped(node: &Node) -> bool {
    node.as_mapping()
        .is_some_and(|map| map.contains_key("entity") && map.contains_key("meta"))
}

pub struct ContentDocumentCodec {
    config: TranscoderConfig,
    filter: FieldFilter,
    masks: MaskRegistry,
}

impl ContentDocumentCodec {
    pub fn new(config: TranscoderConfig) -> Self {
        let filter = FieldFilter::compile(&config.filter);
        Self {
            config,
            filter,
            masks: MaskRegistry::new(),
        }
    }

    pub fn with_masks(mut self, masks: MaskRegistry) -> Self {
        self.masks = masks;
        self
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    pub fn filter(&self) -> &FieldFilter {
        &self.filter
    }

    /// Problems found in the configuration, e.g. invalid copy patterns
    pub fn config_errors(&self) -> Vec<TranscodeError> {
        self.filter.config_errors()
    }

    pub fn block_codec(&self) -> BlockCodec<'_> {
        BlockCodec::new(&self.filter, &self.masks)
    }

    /// Collapse single-element lists under the normalization roots
    ///
    /// Applies to the tree itself and to every nested `{entity, meta}` value.
    pub fn normalize(&self, tree: &Node) -> Node {
        let mut tree = tree.clone();
        self.normalize_entity(&mut tree);
        tree
    }

    fn normalize_entity(&self, node: &mut Node) {
        let Some(map) = node.as_mapping_mut() else {
            return;
        };

        for root in &self.config.normalize_roots {
            if let Some(Node::Mapping(values)) = map.get_mut(root) {
                values.values_mut().for_each(collapse_single_element);
            }
        }

        for child in map.values_mut() {
            self.normalize_nested(child);
        }
    }

    fn normalize_nested(&self, node: &mut Node) {
        if is_entity_shaped(node) {
            self.normalize_entity(node);
            return;
        }

        match node {
            Node::Mapping(map) => map.values_mut().for_each(|child| self.normalize_nested(child)),
            Node::Sequence(items) => items.iter_mut().for_each(|child| self.normalize_nested(child)),
            _ => {}
        }
    }

    /// Build the wire document for a tree
    pub fn encode(&self, tree: &Node) -> TranscodeResult<WireDocument> {
        let source = encode_source(tree, self.config.source_line_width)?;

        let normalized = self.normalize(tree);
        let fields = self.filter.filter_outbound(flatten(&normalized, ""));
        let block_codec = self.block_codec();

        let mut wire_fields = Vec::with_capacity(fields.len());
        for field in fields {
            let payload = if self.config.process_blocks && has_blocks(&field.value) {
                FieldPayload::Blocks(block_codec.encode_field(&field.value)?)
            } else {
                FieldPayload::Text(field.value)
            };

            wire_fields.push(WireField {
                key: self.filter.classify(&field.path).map(str::to_string),
                path: field.path,
                payload,
            });
        }

        let mut directives: Vec<String> = DIRECTIVES.iter().map(|d| d.to_string()).collect();
        directives.push(generator_directive());

        Ok(WireDocument {
            directives,
            fields: wire_fields,
            source,
        })
    }

    /// Rebuild the tree from a (translated) wire document
    ///
    /// Only leaves whose text came back changed are coerced to numbers; an
    /// untouched leaf keeps the type it had in the source snapshot.
    pub fn decode(&self, document: &WireDocument) -> TranscodeResult<Node> {
        let original = self.normalize(&decode_source(&document.source)?);
        let leaves = flatten_nodes(&original, "");

        let block_codec = self.block_codec();
        let mut translated = Vec::with_capacity(document.fields.len());
        for field in &document.fields {
            let value = match &field.payload {
                FieldPayload::Text(text) => text.clone(),
                FieldPayload::Blocks(nodes) => block_codec.decode_field(nodes)?,
            };
            translated.push(FlatField::new(field.path.as_str(), value));
        }

        let mut result = Vec::new();
        for leaf in restore_on_inbound(&leaves, &translated) {
            if self.filter.is_ignored(&leaf.path) {
                debug!("Field '{}' is ignored, pruning from result", leaf.path);
                continue;
            }

            let coerced = if leaf.translated && self.config.coerce_numeric_strings {
                leaf.value.as_str().and_then(numeric_value)
            } else {
                None
            };
            result.push((leaf.path, coerced.unwrap_or(leaf.value)));
        }

        Ok(structurize_nodes(result))
    }

    pub fn encode_to_xml(&self, tree: &Node) -> TranscodeResult<String> {
        self.encode(tree)?.to_xml()
    }

    pub fn decode_from_xml(&self, xml: &str) -> TranscodeResult<Node> {
        self.decode(&WireDocument::from_xml(xml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::WireNode;
    use crate::filter::FilterConfig;

    fn tree(json: &str) -> Node {
        Node::from_json_str(json).unwrap()
    }

    fn post() -> Node {
        tree(
            r#"{
                "entity": {
                    "post_title": "Hello",
                    "post_content": "<p>Body</p>",
                    "post_status": "draft",
                    "menu_order": 0,
                    "guid": "http://example.com/?p=1"
                },
                "meta": {
                    "_edit_lock": "1450:1",
                    "subtitle": "Small",
                    "gallery": []
                }
            }"#,
        )
    }

    fn set_text(document: &mut WireDocument, path: &str, value: &str) {
        let field = document
            .fields
            .iter_mut()
            .find(|f| f.path == path)
            .unwrap();
        field.payload = FieldPayload::Text(value.to_string());
    }

    #[test]
    fn test_encode_fields_and_directives() {
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());
        let document = codec.encode(&post()).unwrap();

        let paths: Vec<&str> = document.fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "entity/post_title",
                "entity/post_content",
                "entity/post_status",
                "entity/menu_order",
                "entity/guid",
                "meta/_edit_lock",
                "meta/subtitle",
            ]
        );
        assert_eq!(document.directives.len(), 5);
        assert!(document.directives[4].starts_with("content-transcoder v. "));
        assert_eq!(decode_source(&document.source).unwrap(), post());
    }

    #[test]
    fn test_identity_translation_round_trip() {
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());
        let original = post();
        let document = codec.encode(&original).unwrap();
        assert_eq!(codec.decode(&document).unwrap(), original);
    }

    #[test]
    fn test_empty_tree_round_trip() {
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());
        let document = codec.encode(&tree("{}")).unwrap();
        assert!(document.fields.is_empty());

        let decoded = codec.decode_from_xml(&document.to_xml().unwrap()).unwrap();
        assert_eq!(decoded, tree("{}"));
    }

    #[test]
    fn test_translated_values_overlay_source() {
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());
        let mut document = codec.encode(&post()).unwrap();
        set_text(&mut document, "entity/post_title", "Bonjour");
        set_text(&mut document, "meta/subtitle", "Petit");

        let decoded = codec.decode(&document).unwrap();
        assert_eq!(
            decoded.get("entity").unwrap().get("post_title"),
            Some(&Node::text("Bonjour"))
        );
        assert_eq!(decoded.get("meta").unwrap().get("subtitle"), Some(&Node::text("Petit")));
        assert_eq!(
            decoded.get("entity").unwrap().get("menu_order"),
            Some(&Node::from(0u64))
        );
    }

    #[test]
    fn test_filtered_fields_survive_and_ignored_are_pruned() {
        let config = TranscoderConfig::default().with_filter(FilterConfig {
            ignore: vec!["_edit_lock".to_string()],
            copy_by_name: vec!["guid".to_string(), "post_status".to_string()],
            ..Default::default()
        });
        let codec = ContentDocumentCodec::new(config);
        let document = codec.encode(&post()).unwrap();

        assert!(document.fields.iter().all(|f| !f.path.contains("guid")));
        assert!(document.fields.iter().all(|f| !f.path.contains("_edit_lock")));

        let decoded = codec.decode(&document).unwrap();
        let entity = decoded.get("entity").unwrap();
        assert_eq!(entity.get("guid"), Some(&Node::text("http://example.com/?p=1")));
        assert_eq!(entity.get("post_status"), Some(&Node::text("draft")));
        assert_eq!(decoded.get("meta").unwrap().get("_edit_lock"), None);
    }

    #[test]
    fn test_numeric_coercion_only_for_changed_values() {
        let original = tree(r#"{"entity":{"a":"7","b":"x"}}"#);
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());
        let mut document = codec.encode(&original).unwrap();
        set_text(&mut document, "entity/b", "42");

        let decoded = codec.decode(&document).unwrap();
        let entity = decoded.get("entity").unwrap();
        assert_eq!(entity.get("a"), Some(&Node::text("7")));
        assert_eq!(entity.get("b"), Some(&Node::from(42i64)));

        let codec = ContentDocumentCodec::new(TranscoderConfig {
            coerce_numeric_strings: false,
            ..Default::default()
        });
        let decoded = codec.decode(&document).unwrap();
        assert_eq!(decoded.get("entity").unwrap().get("b"), Some(&Node::text("42")));
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value("12"), Some(Node::from(12i64)));
        assert_eq!(numeric_value("-3"), Some(Node::from(-3i64)));
        assert!(matches!(numeric_value("1.5"), Some(Node::Number(_))));
        assert_eq!(numeric_value("e"), None);
        assert_eq!(numeric_value("12px"), None);
        assert_eq!(numeric_value(""), None);
    }

    #[test]
    fn test_meta_single_element_lists_are_normalized() {
        let original = tree(
            r#"{"entity":{"post_title":"T"},"meta":{"_thumbnail_id":["12"],"tags":["a","b"]},
                "related":{"entity":{"post_title":"R"},"meta":{"color":["red"]}}}"#,
        );
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());
        let document = codec.encode(&original).unwrap();

        let paths: Vec<&str> = document.fields.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"meta/_thumbnail_id"));
        assert!(paths.contains(&"meta/tags/1"));
        assert!(paths.contains(&"related/meta/color"));

        let decoded = codec.decode(&document).unwrap();
        assert_eq!(decoded.get("meta").unwrap().get("_thumbnail_id"), Some(&Node::text("12")));
        assert_eq!(
            decoded.get("related").unwrap().get("meta").unwrap().get("color"),
            Some(&Node::text("red"))
        );
    }

    #[test]
    fn test_key_classification() {
        let mut filter = FilterConfig::default();
        filter.key.insert("title".to_string(), vec!["post_title".to_string()]);
        let codec = ContentDocumentCodec::new(TranscoderConfig::default().with_filter(filter));

        let document = codec.encode(&post()).unwrap();
        assert_eq!(document.fields[0].key.as_deref(), Some("title"));
        assert_eq!(document.fields[1].key, None);

        let xml = document.to_xml().unwrap();
        assert!(xml.contains(r#"<string name="entity/post_title" key="title">"#));
        assert_eq!(WireDocument::from_xml(&xml).unwrap(), document);
    }

    #[test]
    fn test_xml_envelope() {
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());
        let xml = codec.encode_to_xml(&tree(r#"{"title":"Fish & Chips"}"#)).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(xml.contains("<!-- smartling.translate_paths = data/string -->\n"));
        assert!(xml.contains("<!-- smartling.variants_enabled = true -->\n"));
        assert!(xml.contains(r#"<string name="title"><![CDATA[Fish & Chips]]></string>"#));
        assert!(xml.contains("<source><![CDATA["));

        let decoded = codec.decode_from_xml(&xml).unwrap();
        assert_eq!(decoded, tree(r#"{"title":"Fish & Chips"}"#));
    }

    #[test]
    fn test_source_is_wrapped() {
        let long = "x".repeat(300);
        let encoded = encode_source(&Node::text(long.as_str()), 80).unwrap();
        assert!(encoded.lines().count() > 1);
        assert!(encoded.lines().all(|line| line.len() <= 80));
        assert_eq!(decode_source(&encoded).unwrap(), Node::text(long.as_str()));
    }

    #[test]
    fn test_block_fields_travel_as_block_nodes() {
        let content = "<!-- wp:core/paragraph -->Hello<!-- /wp:core/paragraph -->\n<!-- wp:core/separator /-->";
        let original = tree(&format!(
            r#"{{"entity":{{"post_content":{}}}}}"#,
            serde_json::to_string(content).unwrap()
        ));
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());

        let xml = codec.encode_to_xml(&original).unwrap();
        assert!(xml.contains(r#"<gutenbergBlock blockName="core/paragraph""#));
        assert_eq!(codec.decode_from_xml(&xml).unwrap(), original);

        let mut document = WireDocument::from_xml(&xml).unwrap();
        let FieldPayload::Blocks(nodes) = &mut document.fields[0].payload else {
            panic!("Expected block payload");
        };
        if let WireNode::Chunk(chunk) = &mut nodes[0].children[0] {
            chunk.text = "Bonjour".to_string();
        }

        let decoded = codec.decode(&document).unwrap();
        assert_eq!(
            decoded.get("entity").unwrap().get("post_content"),
            Some(&Node::text(
                "<!-- wp:core/paragraph -->Bonjour<!-- /wp:core/paragraph -->\n<!-- wp:core/separator /-->"
            ))
        );
    }

    #[test]
    fn test_block_processing_can_be_disabled() {
        let original = tree(r#"{"c":"<!-- wp:core/separator /-->"}"#);
        let codec = ContentDocumentCodec::new(TranscoderConfig {
            process_blocks: false,
            ..Default::default()
        });
        let document = codec.encode(&original).unwrap();
        assert!(matches!(document.fields[0].payload, FieldPayload::Text(_)));
    }

    #[test]
    fn test_malformed_documents() {
        let codec = ContentDocumentCodec::new(TranscoderConfig::default());
        for xml in [
            "<data><string name=\"a\">",
            "<data><string name=\"a\">x</string></data>",
            "<data><source><![CDATA[!!!not base64!!!]]></source></data>",
            "<other><source>e30=</source></other>",
        ] {
            assert!(
                matches!(codec.decode_from_xml(xml), Err(TranscodeError::MalformedDocument(_))),
                "expected malformed: {}",
                xml
            );
        }
    }
}
