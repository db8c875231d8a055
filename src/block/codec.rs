//! Block wire codec
//!
//! A block travels as a `gutenbergBlock` node carrying its name and its
//! full original attributes (base64 JSON), followed by its children in
//! order and then one `blockAttribute` node per translatable attribute:
//!
//! ```text
//! <gutenbergBlock blockName="core/heading" originalAttributes="eyJsZXZlbCI6Mn0=">
//!   <contentChunk hash="..."><![CDATA[<h2>Title</h2>]]></contentChunk>
//!   <blockAttribute name="content" hash="..."><![CDATA[Title]]></blockAttribute>
//! </gutenbergBlock>
//! ```
//!
//! Decoding renders the block again from the translated chunks, with the
//! translated attributes overlaid on the original ones.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use super::mask::MaskRegistry;
use super::parser::parse_blocks;
use super::{Block, BlockChild, TextChunk, content_hash, render_delimited};
use crate::error::{TranscodeError, TranscodeResult};
use crate::filter::{FieldFilter, restore_on_inbound};
use crate::flatten::{FlatField, flatten, flatten_nodes, structurize_nodes};
use crate::tree::Node;
use crate::xml::{XmlElement, XmlWriter};

pub const BLOCK_NODE: &str = "gutenbergBlock";
pub const CHUNK_NODE: &str = "contentChunk";
pub const ATTRIBUTE_NODE: &str = "blockAttribute";

/// A translatable attribute leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNode {
    pub name: String,
    pub hash: String,
    pub text: String,
}

impl AttributeNode {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            name: name.into(),
            hash: content_hash(&text),
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WireNode {
    Block(BlockNode),
    Chunk(TextChunk),
    Attribute(AttributeNode),
    /// Any other element found inside a block node
    Unknown(String),
}

/// Wire form of one block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub name: Option<String>,
    /// Base64 JSON of the complete attribute tree before filtering
    pub original_attributes: String,
    pub children: Vec<WireNode>,
}

fn pack_attributes(attributes: &Node) -> TranscodeResult<String> {
    Ok(STANDARD.encode(attributes.to_json_string()?))
}

fn unpack_attributes(encoded: &str) -> TranscodeResult<Node> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Ok(Node::empty_mapping());
    }

    let bytes = STANDARD.decode(encoded).map_err(|e| {
        TranscodeError::MalformedDocument(format!("Undecodable block attributes: {}", e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        TranscodeError::MalformedDocument(format!("Undecodable block attributes: {}", e))
    })
}

/// Encodes blocks to wire nodes and renders wire nodes back to markup
///
/// Attribute fields go through the same filter as document fields, wrapped
/// by the masker registered for the block name.
pub struct BlockCodec<'a> {
    filter: &'a FieldFilter,
    masks: &'a MaskRegistry,
}

impl<'a> BlockCodec<'a> {
    pub fn new(filter: &'a FieldFilter, masks: &'a MaskRegistry) -> Self {
        Self { filter, masks }
    }

    fn translatable_attributes(&self, name: &str, attributes: &Node) -> Vec<FlatField> {
        let fields = flatten(attributes, "");
        let fields = self.masks.mask(name, fields);
        let fields = self.filter.filter_outbound(fields);
        self.masks.unmask(name, fields)
    }

    pub fn encode_block(&self, block: &Block) -> TranscodeResult<BlockNode> {
        let mut children = Vec::with_capacity(block.children.len());
        for child in &block.children {
            match child {
                BlockChild::Chunk(chunk) => children.push(WireNode::Chunk(chunk.clone())),
                BlockChild::Block(inner) => children.push(WireNode::Block(self.encode_block(inner)?)),
            }
        }

        if let Some(name) = &block.name {
            for field in self.translatable_attributes(name, &block.attributes) {
                children.push(WireNode::Attribute(AttributeNode::new(field.path, field.value)));
            }
        }

        Ok(BlockNode {
            name: block.name.clone(),
            original_attributes: pack_attributes(&block.attributes)?,
            children,
        })
    }

    pub fn decode_block(&self, node: &BlockNode) -> TranscodeResult<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut translated: Vec<FlatField> = Vec::new();

        for child in &node.children {
            match child {
                WireNode::Block(inner) => chunks.push(self.decode_block(inner)?),
                WireNode::Chunk(chunk) => chunks.push(chunk.text.clone()),
                WireNode::Attribute(attribute) => {
                    translated.push(FlatField::new(attribute.name.as_str(), attribute.text.as_str()))
                }
                WireNode::Unknown(name) => {
                    warn!("Got unexpected child with name='{}' while applying translation.", name)
                }
            }
        }

        let body = chunks.concat();
        let Some(name) = &node.name else {
            return Ok(body);
        };

        let original = unpack_attributes(&node.original_attributes)?;
        let attributes = if original.is_empty() {
            if !translated.is_empty() {
                debug!("Block '{}' has no original attributes, dropping translated ones", name);
            }
            Node::empty_mapping()
        } else {
            let leaves = flatten_nodes(&original, "");
            let merged = restore_on_inbound(&leaves, &translated);
            structurize_nodes(merged.into_iter().map(|leaf| (leaf.path, leaf.value)))
        };

        render_delimited(name, &attributes, &body, !chunks.is_empty())
    }

    /// Parse the markup of a whole field and encode its top-level blocks
    pub fn encode_field(&self, text: &str) -> TranscodeResult<Vec<BlockNode>> {
        parse_blocks(text)
            .iter()
            .map(|block| self.encode_block(block))
            .collect()
    }

    /// Render and concatenate the blocks of a field
    pub fn decode_field(&self, nodes: &[BlockNode]) -> TranscodeResult<String> {
        let mut output = String::new();
        for node in nodes {
            output.push_str(&self.decode_block(node)?);
        }
        Ok(output)
    }
}

impl BlockNode {
    pub fn write_xml(&self, writer: &mut XmlWriter) -> TranscodeResult<()> {
        let name = self.name.as_deref().unwrap_or_default();
        writer.start(
            BLOCK_NODE,
            &[("blockName", name), ("originalAttributes", self.original_attributes.as_str())],
        )?;

        for child in &self.children {
            match child {
                WireNode::Block(inner) => inner.write_xml(writer)?,
                WireNode::Chunk(chunk) => {
                    writer.cdata_element(CHUNK_NODE, &[("hash", chunk.hash.as_str())], &chunk.text)?
                }
                WireNode::Attribute(attribute) => writer.cdata_element(
                    ATTRIBUTE_NODE,
                    &[("name", attribute.name.as_str()), ("hash", attribute.hash.as_str())],
                    &attribute.text,
                )?,
                WireNode::Unknown(_) => {}
            }
        }

        writer.end(BLOCK_NODE)
    }

    /// Read a `gutenbergBlock` element; text between child elements is ignored
    pub fn from_xml(element: &XmlElement) -> TranscodeResult<Self> {
        let name = element
            .attribute("blockName")
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let original_attributes = element
            .attribute("originalAttributes")
            .unwrap_or_default()
            .to_string();

        let mut children = Vec::new();
        for child in element.elements() {
            let node = match child.name.as_str() {
                BLOCK_NODE => WireNode::Block(BlockNode::from_xml(child)?),
                CHUNK_NODE => WireNode::Chunk(TextChunk {
                    hash: child.attribute("hash").unwrap_or_default().to_string(),
                    text: child.text(),
                }),
                ATTRIBUTE_NODE => WireNode::Attribute(AttributeNode {
                    name: child.attribute("name").unwrap_or_default().to_string(),
                    hash: child.attribute("hash").unwrap_or_default().to_string(),
                    text: child.text(),
                }),
                other => WireNode::Unknown(other.to_string()),
            };
            children.push(node);
        }

        Ok(BlockNode {
            name,
            original_attributes,
            children,
        })
    }
}
