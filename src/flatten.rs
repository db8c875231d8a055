//! Path flattening
//!
//! Bidirectional mapping between a nested content tree and an ordered list of
//! `(path, value)` pairs, where a path joins the keys (or sequence indices)
//! leading to a leaf with `/`.
//!
//! ```text
//! {"a": {"b": "x", "c": ["y", "z"]}}
//!     <=>  a/b = x
//!          a/c/0 = y
//!          a/c/1 = z
//! ```
//!
//! Keys containing the divider are not supported: such a key would be split
//! into two segments on the way back.

use crate::tree::{Mapping, Node};

/// Separator between path segments
pub const DIVIDER: char = '/';

/// One translatable `(path, value)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatField {
    pub path: String,
    pub value: String,
}

impl FlatField {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Append a segment to a base path
pub fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}{}{}", base, DIVIDER, segment)
    }
}

/// Last segment of a path
pub fn leaf_name(path: &str) -> &str {
    path.rsplit(DIVIDER).next().unwrap_or(path)
}

/// Flatten a tree into string fields in pre-order traversal order
///
/// Leaves are coerced to their flat string form. Empty containers carry no
/// text and produce no field.
pub fn flatten(tree: &Node, base: &str) -> Vec<FlatField> {
    flatten_nodes(tree, base)
        .into_iter()
        .filter(|(_, leaf)| !leaf.is_container())
        .map(|(path, leaf)| FlatField::new(path, leaf.to_flat_string()))
        .collect()
}

/// Flatten a tree keeping typed leaves
///
/// Empty containers are reported as leaves so that `structurize_nodes` can
/// rebuild them.
pub fn flatten_nodes(tree: &Node, base: &str) -> Vec<(String, Node)> {
    let mut output = Vec::new();
    collect_leaves(tree, base, &mut output);
    output
}

fn collect_leaves(node: &Node, path: &str, output: &mut Vec<(String, Node)>) {
    match node {
        Node::Mapping(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaves(child, &join_path(path, key), output);
            }
        }
        Node::Sequence(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                collect_leaves(child, &join_path(path, &index.to_string()), output);
            }
        }
        leaf => output.push((path.to_string(), leaf.clone())),
    }
}

/// Rebuild a tree from string fields
pub fn structurize(fields: &[FlatField]) -> Node {
    structurize_nodes(
        fields
            .iter()
            .map(|field| (field.path.clone(), Node::text(field.value.as_str()))),
    )
}

/// Rebuild a tree from typed leaves
///
/// Intermediate containers are created on demand; when two paths collide the
/// later one wins. A container whose keys are exactly `0..n` in order becomes a
/// sequence, every other container a mapping. An empty path addresses the root
/// itself, as produced by flattening an empty or scalar tree.
pub fn structurize_nodes<I>(leaves: I) -> Node
where
    I: IntoIterator<Item = (String, Node)>,
{
    let mut root = Mapping::new();
    let mut root_leaf: Option<Node> = None;

    for (path, leaf) in leaves {
        if path.is_empty() {
            root.clear();
            root_leaf = Some(leaf);
            continue;
        }

        let segments: Vec<&str> = path.split(DIVIDER).collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut pointer = &mut root;
        for segment in parents {
            let child = pointer
                .entry(segment.to_string())
                .or_insert_with(Node::empty_mapping);
            pointer = ensure_mapping(child);
        }
        pointer.insert(last.to_string(), leaf);
    }

    match root_leaf {
        Some(leaf) if root.is_empty() => leaf,
        _ => rebuild_containers(Node::Mapping(root)),
    }
}

fn ensure_mapping(node: &mut Node) -> &mut Mapping {
    if !matches!(node, Node::Mapping(_)) {
        *node = Node::empty_mapping();
    }
    match node {
        Node::Mapping(map) => map,
        _ => unreachable!("node was just replaced by a mapping"),
    }
}

fn rebuild_containers(node: Node) -> Node {
    match node {
        Node::Mapping(map) => {
            let is_sequence = !map.is_empty()
                && map
                    .keys()
                    .enumerate()
                    .all(|(index, key)| *key == index.to_string());

            if is_sequence {
                Node::Sequence(map.into_values().map(rebuild_containers).collect())
            } else {
                Node::Mapping(
                    map.into_iter()
                        .map(|(key, child)| (key, rebuild_containers(child)))
                        .collect(),
                )
            }
        }
        Node::Sequence(items) => Node::Sequence(items.into_iter().map(rebuild_containers).collect()),
        leaf => leaf,
    }
}
