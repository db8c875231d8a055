//! Round-trips structured CMS content through flat-string translation
//! pipelines.
//!
//! A content item (nested metadata, block markup, references to other
//! items) is flattened into translatable strings, shipped as an XML wire
//! document, and merged back into its original shape once translated.

pub mod block;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod flatten;
pub mod jobs;
pub mod mt;
pub mod resolver;
pub mod tree;
pub mod xml;

mod integration_tests;

// Re-export the main entry points for convenient access
pub use block::{Block, BlockCodec, BlockNode, parse_blocks};
pub use config::{TranscoderConfig, load_config_from_file, load_config_from_str};
pub use document::{ContentDocumentCodec, FieldPayload, WireDocument, WireField};
pub use error::{TranscodeError, TranscodeResult};
pub use filter::{FieldFilter, FilterConfig};
pub use flatten::{FlatField, flatten, structurize};
pub use jobs::{JobReport, LastModifiedCheckJob};
pub use resolver::{RelatedContentResolver, Submission, SubmissionStatus};
pub use tree::{Mapping, Node};
