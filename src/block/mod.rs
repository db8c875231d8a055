//! Content blocks
//!
//! Block-structured content is stored as HTML with delimiter comments:
//!
//! ```text
//! <!-- wp:core/heading {"level":2} --><h2>Title</h2><!-- /wp:core/heading -->
//! <!-- wp:core/separator /-->
//! ```
//!
//! This module holds the block model and its canonical rendering. The
//! `parser` turns markup into blocks, the `codec` maps blocks to and from
//! their wire nodes, and `mask` hosts per-block attribute masking.

pub mod codec;
pub mod mask;
pub mod parser;

pub use codec::{BlockCodec, BlockNode, WireNode};
pub use mask::{AttributeMasker, ExcludeAttributes, MaskRegistry};
pub use parser::{BlockParser, has_blocks, parse_blocks};

use crate::error::TranscodeResult;
use crate::tree::Node;

/// Fingerprint of a text chunk, lowercase hex md5
pub fn content_hash(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Literal text between block delimiters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub hash: String,
    pub text: String,
}

impl TextChunk {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            hash: content_hash(&text),
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockChild {
    Chunk(TextChunk),
    Block(Block),
}

/// A named, attributed content unit with ordered children
///
/// A block without a name is a pass-through holder for literal text found
/// between delimited blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: Option<String>,
    pub attributes: Node,
    pub children: Vec<BlockChild>,
}

impl Block {
    pub fn named(name: impl Into<String>, attributes: Node) -> Self {
        Self {
            name: Some(name.into()),
            attributes,
            children: Vec::new(),
        }
    }

    pub fn freeform(text: impl Into<String>) -> Self {
        Self {
            name: None,
            attributes: Node::empty_mapping(),
            children: vec![BlockChild::Chunk(TextChunk::new(text))],
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(BlockChild::Chunk(TextChunk::new(text)));
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.children.push(BlockChild::Block(block));
        self
    }

    /// Render the block back to delimited markup
    pub fn render(&self) -> TranscodeResult<String> {
        let mut body = String::new();
        for child in &self.children {
            match child {
                BlockChild::Chunk(chunk) => body.push_str(&chunk.text),
                BlockChild::Block(block) => body.push_str(&block.render()?),
            }
        }

        match &self.name {
            None => Ok(body),
            Some(name) => render_delimited(name, &self.attributes, &body, !self.children.is_empty()),
        }
    }
}

/// Delimited form of a named block
///
/// The attribute JSON and its leading space are left out when there are no
/// attributes. Without content the block is self-closing. Characters that
/// could end the comment or be read as markup are written as `\uXXXX`
/// escapes, so the output parses back to the same attributes.
pub fn render_delimited(
    name: &str,
    attributes: &Node,
    body: &str,
    has_content: bool,
) -> TranscodeResult<String> {
    let attributes = if attributes.is_empty() {
        String::new()
    } else {
        format!(" {}", escape_attributes(&attributes.to_json_string()?))
    };

    if has_content {
        Ok(format!("<!-- wp:{}{} -->{}<!-- /wp:{} -->", name, attributes, body, name))
    } else {
        Ok(format!("<!-- wp:{}{} /-->", name, attributes))
    }
}

/// Escape `--`, `<`, `>`, `&` and escaped quotes in serialized attributes
fn escape_attributes(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut chars = json.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('"') => out.push_str("\\u0022"),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => out.push('\\'),
            },
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                out.push_str("\\u002d\\u002d");
            }
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(c),
        }
    }

    out
}
