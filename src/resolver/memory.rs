//! In-memory content site
//!
//! Deterministic implementations of the resolver ports used by the tests
//! and for dry runs. Every write is appended to a shared journal so the
//! order of side effects can be inspected.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::context::{BlogId, SiteContext};
use super::ports::{ContentGateway, Downloader, TermRef};
use super::submission::{Submission, SubmissionKey};
use crate::error::{TranscodeError, TranscodeResult};
use crate::tree::Mapping;

/// Ordered log of side effects shared between fakes
pub type Journal = Rc<RefCell<Vec<String>>>;

/// One content item of a blog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredItem {
    pub related_types: Vec<String>,
    pub metadata: Mapping,
    pub terms: IndexMap<String, Vec<TermRef>>,
    pub menu_items: Vec<u64>,
    pub widget_settings: Mapping,
}

impl StoredItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_related(mut self, types: &[&str]) -> Self {
        self.related_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<crate::tree::Node>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_terms(mut self, taxonomy: &str, term_ids: &[u64]) -> Self {
        self.terms.insert(
            taxonomy.to_string(),
            term_ids.iter().map(|id| TermRef::new(taxonomy, *id)).collect(),
        );
        self
    }

    pub fn with_menu_items(mut self, item_ids: &[u64]) -> Self {
        self.menu_items = item_ids.to_vec();
        self
    }

    pub fn with_widget_setting(mut self, key: &str, value: impl Into<crate::tree::Node>) -> Self {
        self.widget_settings.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Default)]
struct BlogData {
    items: HashMap<(String, u64), StoredItem>,
    assigned_terms: HashMap<(u64, String), Vec<u64>>,
    menu_assignments: HashMap<u64, Vec<u64>>,
}

/// A multi-site installation held in memory
#[derive(Debug)]
pub struct InMemorySite {
    blogs: HashMap<BlogId, BlogData>,
    current: BlogId,
    previous: Vec<BlogId>,
    next_id: u64,
    journal: Journal,
}

impl InMemorySite {
    pub fn new(current: BlogId) -> Self {
        let mut blogs = HashMap::new();
        blogs.insert(current, BlogData::default());
        Self {
            blogs,
            current,
            previous: Vec::new(),
            next_id: 1000,
            journal: Journal::default(),
        }
    }

    pub fn with_blog(mut self, blog_id: BlogId) -> Self {
        self.blogs.entry(blog_id).or_default();
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> Journal {
        Rc::clone(&self.journal)
    }

    /// Add an item to a blog, creating the blog if needed
    pub fn insert_item(&mut self, blog_id: BlogId, content_type: &str, id: u64, item: StoredItem) {
        self.blogs
            .entry(blog_id)
            .or_default()
            .items
            .insert((content_type.to_string(), id), item);
    }

    pub fn item(&self, blog_id: BlogId, content_type: &str, id: u64) -> Option<&StoredItem> {
        self.blogs
            .get(&blog_id)?
            .items
            .get(&(content_type.to_string(), id))
    }

    pub fn assigned_terms(&self, blog_id: BlogId, target_id: u64, taxonomy: &str) -> Option<&[u64]> {
        self.blogs
            .get(&blog_id)?
            .assigned_terms
            .get(&(target_id, taxonomy.to_string()))
            .map(Vec::as_slice)
    }

    pub fn menu_assignment(&self, blog_id: BlogId, menu_id: u64) -> Option<&[u64]> {
        self.blogs
            .get(&blog_id)?
            .menu_assignments
            .get(&menu_id)
            .map(Vec::as_slice)
    }

    fn record(&self, entry: String) {
        self.journal.borrow_mut().push(entry);
    }

    fn current_data(&self) -> TranscodeResult<&BlogData> {
        self.blogs.get(&self.current).ok_or_else(|| {
            TranscodeError::InconsistentLocationState(format!("Blog {} not found", self.current))
        })
    }

    fn current_data_mut(&mut self) -> TranscodeResult<&mut BlogData> {
        let current = self.current;
        self.blogs.get_mut(&current).ok_or_else(|| {
            TranscodeError::InconsistentLocationState(format!("Blog {} not found", current))
        })
    }

    fn find_item(&self, content_type: &str, id: u64) -> TranscodeResult<&StoredItem> {
        let current = self.current;
        self.current_data()?
            .items
            .get(&(content_type.to_string(), id))
            .ok_or_else(|| {
                TranscodeError::MissingReferenceTarget(format!(
                    "{} {} in blog {}",
                    content_type, id, current
                ))
            })
    }

    fn find_item_mut(&mut self, content_type: &str, id: u64) -> TranscodeResult<&mut StoredItem> {
        let current = self.current;
        self.current_data_mut()?
            .items
            .get_mut(&(content_type.to_string(), id))
            .ok_or_else(|| {
                TranscodeError::MissingReferenceTarget(format!(
                    "{} {} in blog {}",
                    content_type, id, current
                ))
            })
    }
}

impl SiteContext for InMemorySite {
    fn current_blog_id(&self) -> BlogId {
        self.current
    }

    fn switch_to_blog(&mut self, blog_id: BlogId) -> TranscodeResult<()> {
        if !self.blogs.contains_key(&blog_id) {
            return Err(TranscodeError::InconsistentLocationState(format!(
                "Blog {} not found",
                blog_id
            )));
        }
        self.previous.push(self.current);
        self.current = blog_id;
        Ok(())
    }

    fn restore_blog(&mut self) -> TranscodeResult<()> {
        self.current = self.previous.pop().ok_or_else(|| {
            TranscodeError::InconsistentLocationState("No blog to restore".to_string())
        })?;
        Ok(())
    }
}

impl ContentGateway for InMemorySite {
    fn related_types(&self, content_type: &str, id: u64) -> TranscodeResult<Vec<String>> {
        Ok(self.find_item(content_type, id)?.related_types.clone())
    }

    fn metadata(&self, content_type: &str, id: u64) -> TranscodeResult<Mapping> {
        Ok(self.find_item(content_type, id)?.metadata.clone())
    }

    fn set_metadata(&mut self, content_type: &str, id: u64, values: Mapping) -> TranscodeResult<()> {
        let keys: Vec<String> = values.keys().cloned().collect();
        let item = self.find_item_mut(content_type, id)?;
        item.metadata.extend(values);
        self.record(format!(
            "set_metadata {} {} blog {} [{}]",
            content_type,
            id,
            self.current,
            keys.join(",")
        ));
        Ok(())
    }

    fn terms(&self, content_type: &str, id: u64, taxonomy: &str) -> TranscodeResult<Vec<TermRef>> {
        Ok(self
            .find_item(content_type, id)?
            .terms
            .get(taxonomy)
            .cloned()
            .unwrap_or_default())
    }

    fn menu_items(&self, menu_id: u64) -> TranscodeResult<Vec<u64>> {
        Ok(self
            .find_item(super::ports::CONTENT_TYPE_NAV_MENU, menu_id)?
            .menu_items
            .clone())
    }

    fn widget_settings(&self, widget_id: u64) -> TranscodeResult<Mapping> {
        Ok(self
            .find_item(super::ports::CONTENT_TYPE_WIDGET, widget_id)?
            .widget_settings
            .clone())
    }

    fn save_widget_settings(&mut self, widget_id: u64, settings: Mapping) -> TranscodeResult<()> {
        self.find_item_mut(super::ports::CONTENT_TYPE_WIDGET, widget_id)?
            .widget_settings = settings;
        self.record(format!("save_widget_settings {} blog {}", widget_id, self.current));
        Ok(())
    }

    fn create_target_placeholder(&mut self, content_type: &str, source_id: u64) -> TranscodeResult<u64> {
        self.next_id += 1;
        let id = self.next_id;
        self.current_data_mut()?
            .items
            .insert((content_type.to_string(), id), StoredItem::new());
        self.record(format!(
            "placeholder {} {} for {} blog {}",
            content_type, id, source_id, self.current
        ));
        Ok(id)
    }

    fn assign_terms(
        &mut self,
        content_type: &str,
        target_id: u64,
        taxonomy: &str,
        term_ids: &[u64],
    ) -> TranscodeResult<()> {
        let current = self.current;
        self.current_data_mut()?
            .assigned_terms
            .insert((target_id, taxonomy.to_string()), term_ids.to_vec());
        self.record(format!(
            "assign_terms {} {} {} {:?} blog {}",
            content_type, target_id, taxonomy, term_ids, current
        ));
        Ok(())
    }

    fn assign_menu_items(&mut self, menu_id: u64, item_ids: &[u64]) -> TranscodeResult<()> {
        let current = self.current;
        self.current_data_mut()?
            .menu_assignments
            .insert(menu_id, item_ids.to_vec());
        self.record(format!("assign_menu_items {} {:?} blog {}", menu_id, item_ids, current));
        Ok(())
    }
}

/// Downloader that only records what it was asked to fetch
#[derive(Debug, Default)]
pub struct RecordingDownloader {
    downloads: Vec<SubmissionKey>,
    journal: Journal,
    failure: Option<String>,
}

impl RecordingDownloader {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    /// Every download fails with `ExternalServiceError`
    pub fn failing(journal: Journal, message: impl Into<String>) -> Self {
        Self {
            journal,
            failure: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn downloads(&self) -> &[SubmissionKey] {
        &self.downloads
    }
}

impl Downloader for RecordingDownloader {
    fn materialize_download(&mut self, submission: &Submission) -> TranscodeResult<()> {
        if let Some(message) = &self.failure {
            return Err(TranscodeError::ExternalServiceError(message.clone()));
        }
        self.downloads.push(submission.key());
        self.journal.borrow_mut().push(format!(
            "download {} {}",
            submission.content_type, submission.source_id
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    #[test]
    fn test_items_are_per_blog() {
        let mut site = InMemorySite::new(1).with_blog(2);
        site.insert_item(1, "post", 5, StoredItem::new().with_related(&["category"]));

        assert_eq!(site.related_types("post", 5).unwrap(), vec!["category"]);
        site.switch_to_blog(2).unwrap();
        assert!(matches!(
            site.related_types("post", 5),
            Err(TranscodeError::MissingReferenceTarget(_))
        ));
        site.restore_blog().unwrap();
        assert_eq!(site.current_blog_id(), 1);
    }

    #[test]
    fn test_unknown_blog_and_empty_restore() {
        let mut site = InMemorySite::new(1);
        assert!(matches!(
            site.switch_to_blog(4),
            Err(TranscodeError::InconsistentLocationState(_))
        ));
        assert!(matches!(
            site.restore_blog(),
            Err(TranscodeError::InconsistentLocationState(_))
        ));
    }

    #[test]
    fn test_set_metadata_merges_and_journals() {
        let mut site = InMemorySite::new(1);
        site.insert_item(1, "post", 5, StoredItem::new().with_meta("a", "1"));
        let mut values = Mapping::new();
        values.insert("b".to_string(), Node::from(2u64));
        site.set_metadata("post", 5, values).unwrap();

        let meta = &site.item(1, "post", 5).unwrap().metadata;
        assert_eq!(meta.len(), 2);
        assert_eq!(site.journal().borrow().as_slice(), ["set_metadata post 5 blog 1 [b]"]);
    }

    #[test]
    fn test_placeholders_get_fresh_ids() {
        let mut site = InMemorySite::new(1);
        let first = site.create_target_placeholder("post", 5).unwrap();
        let second = site.create_target_placeholder("post", 6).unwrap();
        assert_ne!(first, second);
        assert!(site.item(1, "post", first).is_some());
    }

    #[test]
    fn test_failing_downloader() {
        let mut downloader = RecordingDownloader::failing(Journal::default(), "timeout");
        let submission = Submission::new("attachment", 1, 9, 2, "fr").unwrap();
        assert!(matches!(
            downloader.materialize_download(&submission),
            Err(TranscodeError::ExternalServiceError(_))
        ));
        assert!(downloader.downloads().is_empty());
    }
}
