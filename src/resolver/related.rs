use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use super::context::within_blog;
use super::ports::{
    CONTENT_TYPE_ATTACHMENT, CONTENT_TYPE_CATEGORY, CONTENT_TYPE_NAV_MENU,
    CONTENT_TYPE_NAV_MENU_ITEM, CONTENT_TYPE_POST_TAG, CONTENT_TYPE_WIDGET, ContentGateway,
    Downloader, is_taxonomy,
};
use super::submission::{Submission, SubmissionFilter, SubmissionKey, SubmissionStore};
use crate::error::{TranscodeError, TranscodeResult};
use crate::tree::{Mapping, Node};

const MENU_ITEM_TYPE: &str = "_menu_item_type";
const MENU_ITEM_OBJECT: &str = "_menu_item_object";
const MENU_ITEM_OBJECT_ID: &str = "_menu_item_object_id";
const WIDGET_MENU_SETTING: &str = "nav_menu";
const THUMBNAIL_ID: &str = "_thumbnail_id";

/// Target ids collected during one resolution pass, per category
///
/// Applied to the target item once every reference has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAccumulator {
    categories: IndexMap<String, Vec<u64>>,
}

impl ReferenceAccumulator {
    pub fn new() -> Self {
        let mut categories = IndexMap::new();
        categories.insert(CONTENT_TYPE_CATEGORY.to_string(), Vec::new());
        categories.insert(CONTENT_TYPE_POST_TAG.to_string(), Vec::new());
        Self { categories }
    }

    pub fn push(&mut self, category: &str, target_id: u64) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .push(target_id);
    }

    pub fn get(&self, category: &str) -> &[u64] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u64])> {
        self.categories
            .iter()
            .map(|(category, ids)| (category.as_str(), ids.as_slice()))
    }
}

impl Default for ReferenceAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse single-element lists to their element
fn simplify(mut values: Mapping) -> Mapping {
    for value in values.values_mut() {
        if let Node::Sequence(items) = value {
            if items.len() == 1 {
                let item = items.remove(0);
                *value = item;
            }
        }
    }
    values
}

/// Log and swallow a missing reference, pass anything else through
fn skip_missing<T>(result: TranscodeResult<T>, what: &str) -> TranscodeResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(TranscodeError::MissingReferenceTarget(msg)) => {
            warn!("Skipping {}: {}", what, msg);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Ensures every item referenced by a submission has its own submission
/// and rewrites the references of the target item.
///
/// Within one pass each (content type, source blog, source id, target blog)
/// is looked up or created at most once, which also stops reference cycles.
pub struct RelatedContentResolver<G, S, D> {
    gateway: G,
    store: S,
    downloader: D,
    visited: HashMap<SubmissionKey, Submission>,
}

impl<G, S, D> RelatedContentResolver<G, S, D>
where
    G: ContentGateway,
    S: SubmissionStore,
    D: Downloader,
{
    pub fn new(gateway: G, store: S, downloader: D) -> Self {
        Self {
            gateway,
            store,
            downloader,
            visited: HashMap::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn into_parts(self) -> (G, S, D) {
        (self.gateway, self.store, self.downloader)
    }

    /// Resolve all references of `submission` and apply them to its target
    ///
    /// # Errors
    ///
    /// * `InconsistentLocationState` - a blog switch failed; nothing is applied
    /// * `ExternalServiceError` - a required download failed
    pub fn prepare_related_submissions(&mut self, submission: &Submission) -> TranscodeResult<()> {
        self.visited.clear();
        self.visited.insert(submission.key(), submission.clone());

        let result = self.resolve(submission);
        self.visited.clear();

        if let Err(TranscodeError::InconsistentLocationState(msg)) = &result {
            error!("Inconsistent multisite installation. {}", msg);
        }
        result
    }

    fn resolve(&mut self, submission: &Submission) -> TranscodeResult<()> {
        info!(
            "Searching for related content for submission = '{}' for translation",
            submission.label()
        );

        let related_types = within_blog(&mut self.gateway, submission.source_blog_id, |g| {
            g.related_types(&submission.content_type, submission.source_id)
        })?;

        let mut accumulator = ReferenceAccumulator::new();
        for content_type in &related_types {
            self.process_related_terms(submission, content_type, &mut accumulator)?;
            self.process_related_menu(submission, content_type, &mut accumulator)?;
            skip_missing(
                self.process_menu_related_to_widget(submission, content_type),
                "menu related to widget",
            )?;
        }

        if !related_types.is_empty() {
            skip_missing(self.process_featured_image(submission), "featured image")?;
        }

        self.apply(submission, &accumulator)
    }

    /// Find the active submission for a referenced item or create one
    ///
    /// A new submission gets a placeholder target item and is resolved
    /// itself before being returned.
    fn ensure_translated(
        &mut self,
        parent: &Submission,
        content_type: &str,
        source_id: u64,
    ) -> TranscodeResult<Submission> {
        let key = SubmissionKey {
            content_type: content_type.to_string(),
            source_blog_id: parent.source_blog_id,
            source_id,
            target_blog_id: parent.target_blog_id,
        };

        if let Some(seen) = self.visited.get(&key) {
            debug!("{} {} already handled in this pass", content_type, source_id);
            return Ok(seen.clone());
        }

        let existing = self.store.find(&SubmissionFilter::for_key(&key))?;
        if let Some(mut submission) = existing.into_iter().next() {
            if submission.target_id.is_none() {
                let target_id = within_blog(&mut self.gateway, key.target_blog_id, |g| {
                    g.create_target_placeholder(content_type, source_id)
                })?;
                submission.target_id = Some(target_id);
                submission = self.store.store(submission)?;
            }
            debug!(
                "Found submission {} for {} {}",
                submission.label(),
                content_type,
                source_id
            );
            self.visited.insert(key, submission.clone());
            return Ok(submission);
        }

        let target_id = within_blog(&mut self.gateway, key.target_blog_id, |g| {
            g.create_target_placeholder(content_type, source_id)
        })?;
        let mut submission = Submission::new(
            content_type,
            parent.source_blog_id,
            source_id,
            parent.target_blog_id,
            &parent.target_locale,
        )?;
        submission.target_id = Some(target_id);
        submission.batch_uid = parent.batch_uid.clone();
        let submission = self.store.store(submission)?;
        debug!(
            "Created submission {} for {} {} related to submission {}",
            submission.label(),
            content_type,
            source_id,
            parent.label()
        );

        self.visited.insert(key, submission.clone());
        skip_missing(
            self.resolve(&submission),
            &format!("references of {} {}", content_type, source_id),
        )?;
        Ok(submission)
    }

    fn process_related_terms(
        &mut self,
        submission: &Submission,
        content_type: &str,
        accumulator: &mut ReferenceAccumulator,
    ) -> TranscodeResult<()> {
        if !is_taxonomy(content_type) || submission.content_type == CONTENT_TYPE_WIDGET {
            return Ok(());
        }
        debug!("Searching for terms related to submission = '{}'", submission.label());

        let terms = within_blog(&mut self.gateway, submission.source_blog_id, |g| {
            g.terms(&submission.content_type, submission.source_id, content_type)
        })?;

        for term in terms {
            debug!(
                "Sending for translation term = '{}' id = '{}' related to submission = '{}'",
                term.taxonomy,
                term.term_id,
                submission.label()
            );
            let resolved = self
                .ensure_translated(submission, &term.taxonomy, term.term_id)
                .and_then(|s| s.require_target_id());
            if let Some(target_id) = skip_missing(resolved, &format!("term {}", term.term_id))? {
                accumulator.push(content_type, target_id);
            }
        }
        Ok(())
    }

    fn process_related_menu(
        &mut self,
        submission: &Submission,
        content_type: &str,
        accumulator: &mut ReferenceAccumulator,
    ) -> TranscodeResult<()> {
        if content_type != CONTENT_TYPE_NAV_MENU_ITEM {
            return Ok(());
        }
        debug!("Searching for menuItems related to submission = '{}'", submission.label());

        let items = within_blog(&mut self.gateway, submission.source_blog_id, |g| {
            g.menu_items(submission.source_id)
        })?;

        for item_id in items {
            let resolved = self.process_menu_item(submission, item_id);
            if let Some(target_id) = skip_missing(resolved, &format!("menu item {}", item_id))? {
                accumulator.push(CONTENT_TYPE_NAV_MENU, target_id);
            }
        }
        Ok(())
    }

    fn process_menu_item(&mut self, submission: &Submission, item_id: u64) -> TranscodeResult<u64> {
        debug!(
            "Sending for translation entity = '{}' id = '{}' related to submission = '{}'",
            CONTENT_TYPE_NAV_MENU_ITEM,
            item_id,
            submission.label()
        );
        let item_submission = self.ensure_translated(submission, CONTENT_TYPE_NAV_MENU_ITEM, item_id)?;

        let mut meta = simplify(within_blog(&mut self.gateway, submission.source_blog_id, |g| {
            g.metadata(CONTENT_TYPE_NAV_MENU_ITEM, item_id)
        })?);

        let item_type = meta.get(MENU_ITEM_TYPE).and_then(Node::as_str).unwrap_or_default();
        if matches!(item_type, "taxonomy" | "post_type") {
            let object_type = meta
                .get(MENU_ITEM_OBJECT)
                .and_then(Node::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    TranscodeError::MissingReferenceTarget(format!(
                        "menu item {} has no object type",
                        item_id
                    ))
                })?;
            let object_id = meta
                .get(MENU_ITEM_OBJECT_ID)
                .and_then(Node::as_u64)
                .ok_or_else(|| {
                    TranscodeError::MissingReferenceTarget(format!(
                        "menu item {} has no object id",
                        item_id
                    ))
                })?;

            debug!(
                "Sending for translation object = '{}' related to '{}' related to submission = '{}'",
                object_type,
                CONTENT_TYPE_NAV_MENU_ITEM,
                item_id
            );
            let object_target = self
                .ensure_translated(submission, &object_type, object_id)?
                .require_target_id()?;
            meta.insert(MENU_ITEM_OBJECT_ID.to_string(), Node::from(object_target));
        }

        let target_id = item_submission.require_target_id()?;
        within_blog(&mut self.gateway, submission.target_blog_id, |g| {
            g.set_metadata(CONTENT_TYPE_NAV_MENU_ITEM, target_id, meta)
        })?;
        Ok(target_id)
    }

    fn process_menu_related_to_widget(
        &mut self,
        submission: &Submission,
        content_type: &str,
    ) -> TranscodeResult<()> {
        if content_type != CONTENT_TYPE_NAV_MENU || submission.content_type != CONTENT_TYPE_WIDGET {
            return Ok(());
        }
        debug!("Searching for menu related to widget for submission = '{}'", submission.label());

        let settings = within_blog(&mut self.gateway, submission.source_blog_id, |g| {
            g.widget_settings(submission.source_id)
        })?;
        let menu_id = settings
            .get(WIDGET_MENU_SETTING)
            .and_then(Node::as_u64)
            .unwrap_or(0);
        if menu_id == 0 {
            return Ok(());
        }

        debug!(
            "Sending for translation menu related to widget id = '{}' related to submission = '{}'",
            submission.source_id,
            submission.label()
        );
        let new_menu_id = self
            .ensure_translated(submission, CONTENT_TYPE_NAV_MENU, menu_id)?
            .require_target_id()?;

        let widget_id = submission.require_target_id()?;
        within_blog(&mut self.gateway, submission.target_blog_id, |g| {
            let mut settings = g.widget_settings(widget_id)?;
            settings.insert(WIDGET_MENU_SETTING.to_string(), Node::from(new_menu_id));
            g.save_widget_settings(widget_id, settings)
        })
    }

    fn process_featured_image(&mut self, submission: &Submission) -> TranscodeResult<()> {
        debug!("Searching for Featured Images related to submission = '{}'", submission.label());

        let meta = within_blog(&mut self.gateway, submission.source_blog_id, |g| {
            g.metadata(&submission.content_type, submission.source_id)
        })?;
        let Some(thumbnail) = meta.get(THUMBNAIL_ID) else {
            return Ok(());
        };

        let thumbnail = match thumbnail {
            Node::Sequence(items) => items.first(),
            other => Some(other),
        };
        let attachment_id = thumbnail.and_then(Node::as_u64).ok_or_else(|| {
            TranscodeError::MissingReferenceTarget(format!(
                "featured image of submission {} is not an id",
                submission.label()
            ))
        })?;

        debug!(
            "Sending for translation Featured Image id = '{}' related to submission = '{}'",
            attachment_id,
            submission.label()
        );
        let attachment = self.ensure_translated(submission, CONTENT_TYPE_ATTACHMENT, attachment_id)?;
        self.downloader.materialize_download(&attachment)?;

        let attachment_target = attachment.require_target_id()?;
        let target_id = submission.require_target_id()?;
        let mut values = Mapping::new();
        values.insert(THUMBNAIL_ID.to_string(), Node::from(attachment_target));
        within_blog(&mut self.gateway, submission.target_blog_id, |g| {
            g.set_metadata(&submission.content_type, target_id, values)
        })
    }

    fn apply(&mut self, submission: &Submission, accumulator: &ReferenceAccumulator) -> TranscodeResult<()> {
        let target_id = submission.require_target_id()?;

        within_blog(&mut self.gateway, submission.target_blog_id, |g| {
            if submission.content_type == CONTENT_TYPE_NAV_MENU {
                g.assign_menu_items(target_id, accumulator.get(CONTENT_TYPE_NAV_MENU))
            } else {
                for (taxonomy, ids) in accumulator.iter() {
                    g.assign_terms(&submission.content_type, target_id, taxonomy, ids)?;
                }
                Ok(())
            }
        })
    }
}
