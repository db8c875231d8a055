//! Collaborators of the related content resolver
//!
//! Every read and write is issued against the current blog of the
//! gateway; the resolver scopes each call with `within_blog`.

use crate::error::TranscodeResult;
use crate::resolver::context::SiteContext;
use crate::resolver::submission::Submission;
use crate::tree::Mapping;

pub const CONTENT_TYPE_POST: &str = "post";
pub const CONTENT_TYPE_PAGE: &str = "page";
pub const CONTENT_TYPE_ATTACHMENT: &str = "attachment";
pub const CONTENT_TYPE_CATEGORY: &str = "category";
pub const CONTENT_TYPE_POST_TAG: &str = "post_tag";
pub const CONTENT_TYPE_NAV_MENU: &str = "nav_menu";
pub const CONTENT_TYPE_NAV_MENU_ITEM: &str = "nav_menu_item";
pub const CONTENT_TYPE_WIDGET: &str = "widget";

/// Related types resolved as taxonomy terms
pub const TAXONOMY_TYPES: [&str; 3] = [
    CONTENT_TYPE_CATEGORY,
    CONTENT_TYPE_POST_TAG,
    CONTENT_TYPE_NAV_MENU,
];

pub fn is_taxonomy(content_type: &str) -> bool {
    TAXONOMY_TYPES.contains(&content_type)
}

/// A term attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermRef {
    pub taxonomy: String,
    pub term_id: u64,
}

impl TermRef {
    pub fn new(taxonomy: impl Into<String>, term_id: u64) -> Self {
        Self {
            taxonomy: taxonomy.into(),
            term_id,
        }
    }
}

/// Content storage of a multi-site installation
///
/// Lookups of unknown items fail with `MissingReferenceTarget`.
pub trait ContentGateway: SiteContext {
    /// Reference types declared by an item
    fn related_types(&self, content_type: &str, id: u64) -> TranscodeResult<Vec<String>>;

    fn metadata(&self, content_type: &str, id: u64) -> TranscodeResult<Mapping>;

    /// Merge `values` into the item's metadata
    fn set_metadata(&mut self, content_type: &str, id: u64, values: Mapping) -> TranscodeResult<()>;

    /// Terms of one taxonomy attached to an item
    fn terms(&self, content_type: &str, id: u64, taxonomy: &str) -> TranscodeResult<Vec<TermRef>>;

    /// Item ids of a menu, in menu order
    fn menu_items(&self, menu_id: u64) -> TranscodeResult<Vec<u64>>;

    fn widget_settings(&self, widget_id: u64) -> TranscodeResult<Mapping>;

    fn save_widget_settings(&mut self, widget_id: u64, settings: Mapping) -> TranscodeResult<()>;

    /// Create an empty target item and return its id
    fn create_target_placeholder(&mut self, content_type: &str, source_id: u64) -> TranscodeResult<u64>;

    /// Replace the item's terms of one taxonomy
    fn assign_terms(
        &mut self,
        content_type: &str,
        target_id: u64,
        taxonomy: &str,
        term_ids: &[u64],
    ) -> TranscodeResult<()>;

    /// Replace the items of a menu
    fn assign_menu_items(&mut self, menu_id: u64, item_ids: &[u64]) -> TranscodeResult<()>;
}

/// Synchronously fetches and applies the translation of a submission
pub trait Downloader {
    fn materialize_download(&mut self, submission: &Submission) -> TranscodeResult<()>;
}
