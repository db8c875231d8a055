use tracing::{debug, warn};

use super::{Block, BlockChild, TextChunk};
use crate::tree::Node;

/// True when the text contains at least one block opener
pub fn has_blocks(text: &str) -> bool {
    text.contains("<!-- wp:")
}

/// Parse delimited block markup into top-level blocks
pub fn parse_blocks(text: &str) -> Vec<Block> {
    BlockParser::new(text).parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelimiterKind {
    Opener,
    Closer,
    Void,
}

#[derive(Debug)]
struct Delimiter {
    start: usize,
    end: usize,
    kind: DelimiterKind,
    name: String,
    /// `None` when the attribute JSON does not parse
    attributes: Option<Node>,
}

/// A parser for block delimiter comments.
///
/// Text outside any block becomes an unnamed (freeform) block; text inside a
/// block becomes a chunk of that block. Stray closers are kept as text and
/// blocks still open at the end of input are closed there. A delimiter whose
/// attributes are not valid JSON is kept as text, together with its matching
/// closer.
pub struct BlockParser<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> BlockParser<'a> {
    pub fn new(input: &'a str) -> Self {
        BlockParser { input, position: 0 }
    }

    fn skip_whitespace(&self, mut index: usize) -> usize {
        let bytes = self.input.as_bytes();
        while index < bytes.len() && bytes[index].is_ascii_whitespace() {
            index += 1;
        }
        index
    }

    /// Parses the delimiter starting at `start`, which must point at `<!--`.
    ///
    /// Grammar: `<!--` ws `/`? `wp:` name ws (json-object ws)? `/`? `-->`
    fn parse_delimiter_at(&self, start: usize) -> Option<Delimiter> {
        let bytes = self.input.as_bytes();
        let mut index = start + 4;

        let after_ws = self.skip_whitespace(index);
        if after_ws == index {
            return None;
        }
        index = after_ws;

        let is_closer = bytes.get(index) == Some(&b'/');
        if is_closer {
            index += 1;
        }

        if !self.input[index..].starts_with("wp:") {
            return None;
        }
        index += 3;

        let name_start = index;
        if !bytes.get(index).is_some_and(|b| b.is_ascii_lowercase()) {
            return None;
        }
        while bytes.get(index).is_some_and(|b| {
            b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(*b, b'_' | b'-' | b'/')
        }) {
            index += 1;
        }
        let name = self.input[name_start..index].to_string();

        let after_ws = self.skip_whitespace(index);
        if after_ws == index {
            return None;
        }
        index = after_ws;

        let mut attributes = Some(Node::empty_mapping());
        if !is_closer && bytes.get(index) == Some(&b'{') {
            let json_end = self.find_attributes_end(index)?;
            let json = &self.input[index..json_end];
            attributes = match Node::from_json_str(json) {
                Ok(node) => Some(node),
                Err(e) => {
                    warn!("Invalid attributes on block '{}', keeping it as text: {}", name, e);
                    None
                }
            };
            index = self.skip_whitespace(json_end);
        }

        let is_void = bytes.get(index) == Some(&b'/');
        if is_void {
            if is_closer {
                return None;
            }
            index += 1;
        }

        if !self.input[index..].starts_with("-->") {
            return None;
        }

        let kind = if is_closer {
            DelimiterKind::Closer
        } else if is_void {
            DelimiterKind::Void
        } else {
            DelimiterKind::Opener
        };

        Some(Delimiter {
            start,
            end: index + 3,
            kind,
            name,
            attributes,
        })
    }

    /// End (exclusive) of the first `}` followed by whitespace, optional `/`
    /// and `-->`.
    fn find_attributes_end(&self, from: usize) -> Option<usize> {
        let bytes = self.input.as_bytes();
        for (offset, _) in self.input[from..].match_indices('}') {
            let end = from + offset + 1;
            let mut index = self.skip_whitespace(end);
            if index == end {
                continue;
            }
            if bytes.get(index) == Some(&b'/') {
                index += 1;
            }
            if self.input[index..].starts_with("-->") {
                return Some(end);
            }
        }
        None
    }

    fn next_delimiter(&self) -> Option<Delimiter> {
        let mut search_from = self.position;
        while let Some(offset) = self.input[search_from..].find("<!--") {
            let start = search_from + offset;
            if let Some(delimiter) = self.parse_delimiter_at(start) {
                return Some(delimiter);
            }
            search_from = start + 4;
        }
        None
    }

    fn append_text(stack: &mut [Block], output: &mut Vec<Block>, text: &str) {
        if text.is_empty() {
            return;
        }
        match stack.last_mut() {
            Some(parent) => parent.children.push(BlockChild::Chunk(TextChunk::new(text))),
            None => {
                if let Some(previous) = output.last_mut().filter(|block| block.name.is_none()) {
                    let mut merged = previous.render_freeform();
                    merged.push_str(text);
                    *previous = Block::freeform(merged);
                } else {
                    output.push(Block::freeform(text));
                }
            }
        }
    }

    fn attach(stack: &mut [Block], output: &mut Vec<Block>, block: Block) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(BlockChild::Block(block)),
            None => output.push(block),
        }
    }

    pub fn parse(&mut self) -> Vec<Block> {
        let mut output = Vec::new();
        let mut stack: Vec<Block> = Vec::new();
        // Openers kept as text, with the stack depth they were found at
        let mut literal: Vec<(String, usize)> = Vec::new();

        while let Some(delimiter) = self.next_delimiter() {
            let text = &self.input[self.position..delimiter.start];
            Self::append_text(&mut stack, &mut output, text);
            let raw = &self.input[delimiter.start..delimiter.end];

            match (delimiter.kind, delimiter.attributes) {
                (DelimiterKind::Opener, Some(attributes)) => {
                    stack.push(Block::named(delimiter.name, attributes));
                }
                (DelimiterKind::Opener, None) => {
                    literal.push((delimiter.name, stack.len()));
                    Self::append_text(&mut stack, &mut output, raw);
                }
                (DelimiterKind::Void, Some(attributes)) => {
                    let block = Block::named(delimiter.name, attributes);
                    Self::attach(&mut stack, &mut output, block);
                }
                (DelimiterKind::Void, None) => {
                    Self::append_text(&mut stack, &mut output, raw);
                }
                (DelimiterKind::Closer, _)
                    if literal.last() == Some(&(delimiter.name.clone(), stack.len())) =>
                {
                    literal.pop();
                    Self::append_text(&mut stack, &mut output, raw);
                }
                (DelimiterKind::Closer, _) => match stack.pop() {
                    Some(block) => {
                        if block.name.as_deref() != Some(delimiter.name.as_str()) {
                            debug!(
                                "Closer '{}' closes block '{}'",
                                delimiter.name,
                                block.name.as_deref().unwrap_or_default()
                            );
                        }
                        literal.retain(|(_, depth)| *depth <= stack.len());
                        Self::attach(&mut stack, &mut output, block);
                    }
                    None => {
                        debug!("Stray closer '{}' kept as text", delimiter.name);
                        Self::append_text(&mut stack, &mut output, raw);
                    }
                },
            }

            self.position = delimiter.end;
        }

        let rest = &self.input[self.position..];
        Self::append_text(&mut stack, &mut output, rest);
        self.position = self.input.len();

        while let Some(block) = stack.pop() {
            debug!(
                "Block '{}' not closed before end of input",
                block.name.as_deref().unwrap_or_default()
            );
            Self::attach(&mut stack, &mut output, block);
        }

        output
    }
}

impl Block {
    fn render_freeform(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                BlockChild::Chunk(chunk) => Some(chunk.text.as_str()),
                BlockChild::Block(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_all(blocks: &[Block]) -> String {
        blocks.iter().map(|b| b.render().unwrap()).collect()
    }

    #[test]
    fn test_has_blocks() {
        assert!(has_blocks("<!-- wp:core/paragraph -->x<!-- /wp:core/paragraph -->"));
        assert!(!has_blocks("<p>plain</p><!-- comment -->"));
    }

    #[test]
    fn test_parse_paragraph() {
        let blocks = parse_blocks("<!-- wp:core/paragraph -->Hello<!-- /wp:core/paragraph -->");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name.as_deref(), Some("core/paragraph"));
        assert_eq!(blocks[0].children, vec![BlockChild::Chunk(TextChunk::new("Hello"))]);
        assert!(blocks[0].attributes.is_empty());
    }

    #[test]
    fn test_parse_void_with_attributes() {
        let blocks = parse_blocks(r#"<!-- wp:core/image {"id":12,"alt":"a } b"} /-->"#);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name.as_deref(), Some("core/image"));
        assert_eq!(blocks[0].attributes.get("id").and_then(Node::as_u64), Some(12));
        assert_eq!(blocks[0].attributes.get("alt"), Some(&Node::text("a } b")));
        assert!(blocks[0].children.is_empty());
    }

    #[test]
    fn test_freeform_between_blocks() {
        let markup = "<!-- wp:paragraph -->A<!-- /wp:paragraph -->\n\n<!-- wp:separator /-->";
        let blocks = parse_blocks(markup);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].name, None);
        assert_eq!(blocks[1].render().unwrap(), "\n\n");
        assert_eq!(render_all(&blocks), markup);
    }

    #[test]
    fn test_nested_blocks_keep_order() {
        let markup = concat!(
            r#"<!-- wp:core/columns {"columns":2} --><div>"#,
            "<!-- wp:core/column --><p>One</p><!-- /wp:core/column -->",
            "<!-- wp:core/column --><p>Two</p><!-- /wp:core/column -->",
            "</div><!-- /wp:core/columns -->"
        );
        let blocks = parse_blocks(markup);
        assert_eq!(blocks.len(), 1);

        let kinds: Vec<&str> = blocks[0]
            .children
            .iter()
            .map(|c| match c {
                BlockChild::Chunk(_) => "chunk",
                BlockChild::Block(_) => "block",
            })
            .collect();
        assert_eq!(kinds, vec!["chunk", "block", "block", "chunk"]);
        assert_eq!(render_all(&blocks), markup);
    }

    #[test]
    fn test_plain_comments_are_text() {
        let markup = "<p>a</p><!-- note --><!--wp:x -->";
        let blocks = parse_blocks(markup);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, None);
        assert_eq!(render_all(&blocks), markup);
    }

    #[test]
    fn test_stray_closer_and_unclosed_block() {
        let blocks = parse_blocks("x<!-- /wp:para -->y");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].render().unwrap(), "x<!-- /wp:para -->y");

        let blocks = parse_blocks("<!-- wp:quote -->open");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name.as_deref(), Some("quote"));
        assert_eq!(blocks[0].render().unwrap(), "<!-- wp:quote -->open<!-- /wp:quote -->");
    }

    #[test]
    fn test_invalid_attributes_kept_as_text() {
        let markup = r#"<!-- wp:core/button {"text":bad} -->Go<!-- /wp:core/button -->"#;
        let blocks = parse_blocks(markup);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, None);
        assert_eq!(render_all(&blocks), markup);

        let markup = r#"a<!-- wp:core/image {id:1} /-->b"#;
        let blocks = parse_blocks(markup);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, None);
        assert_eq!(render_all(&blocks), markup);
    }

    #[test]
    fn test_invalid_attributes_inside_group() {
        let markup = concat!(
            "<!-- wp:core/group --><div>",
            r#"<!-- wp:core/group {"x":} --><p>In</p><!-- /wp:core/group -->"#,
            "<!-- wp:core/paragraph -->P<!-- /wp:core/paragraph -->",
            "</div><!-- /wp:core/group -->"
        );
        let blocks = parse_blocks(markup);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name.as_deref(), Some("core/group"));

        let nested: Vec<&str> = blocks[0]
            .children
            .iter()
            .filter_map(|c| match c {
                BlockChild::Block(b) => b.name.as_deref(),
                BlockChild::Chunk(_) => None,
            })
            .collect();
        assert_eq!(nested, vec!["core/paragraph"]);
        assert_eq!(render_all(&blocks), markup);
    }
}
