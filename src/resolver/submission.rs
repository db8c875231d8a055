//! Submissions and their persistence port
//!
//! A submission is the request "translate source item X of blog A into
//! blog B / locale L". At most one non-cancelled submission exists per
//! (content type, source blog, source id, target blog).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::context::BlogId;
use crate::error::{TranscodeError, TranscodeResult};
use crate::mt::validate_locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    New,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::New => "New",
            SubmissionStatus::InProgress => "In Progress",
            SubmissionStatus::Completed => "Completed",
            SubmissionStatus::Failed => "Failed",
            SubmissionStatus::Cancelled => "Cancelled",
        }
    }
}

/// Uniqueness key of a submission
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    pub content_type: String,
    pub source_blog_id: BlogId,
    pub source_id: u64,
    pub target_blog_id: BlogId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Assigned by the store
    pub id: Option<u64>,
    pub content_type: String,
    pub source_blog_id: BlogId,
    pub source_id: u64,
    pub target_blog_id: BlogId,
    pub target_id: Option<u64>,
    pub target_locale: String,
    pub status: SubmissionStatus,
    /// Copied to the target without translation
    pub is_cloned: bool,
    pub is_locked: bool,
    pub completion_percentage: u8,
    pub last_modified: Option<DateTime<Utc>>,
    pub batch_uid: Option<String>,
}

impl Submission {
    /// Create a `New` submission, validating the target locale
    pub fn new(
        content_type: impl Into<String>,
        source_blog_id: BlogId,
        source_id: u64,
        target_blog_id: BlogId,
        target_locale: &str,
    ) -> TranscodeResult<Self> {
        validate_locale(target_locale)?;

        Ok(Self {
            id: None,
            content_type: content_type.into(),
            source_blog_id,
            source_id,
            target_blog_id,
            target_id: None,
            target_locale: target_locale.to_string(),
            status: SubmissionStatus::New,
            is_cloned: false,
            is_locked: false,
            completion_percentage: 0,
            last_modified: None,
            batch_uid: None,
        })
    }

    pub fn key(&self) -> SubmissionKey {
        SubmissionKey {
            content_type: self.content_type.clone(),
            source_blog_id: self.source_blog_id,
            source_id: self.source_id,
            target_blog_id: self.target_blog_id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != SubmissionStatus::Cancelled
    }

    /// Readable identifier for log messages
    pub fn label(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => format!("{}:{}", self.content_type, self.source_id),
        }
    }

    /// Target id, required once a submission has been set up
    pub fn require_target_id(&self) -> TranscodeResult<u64> {
        self.target_id.ok_or_else(|| {
            TranscodeError::MissingReferenceTarget(format!(
                "Submission {} has no target item",
                self.label()
            ))
        })
    }

    /// Upload acknowledged by the translation service
    pub fn mark_in_progress(&mut self) {
        if self.status == SubmissionStatus::New {
            self.status = SubmissionStatus::InProgress;
        }
    }

    /// Record translation progress; 100% completes the submission
    pub fn set_completion(&mut self, percentage: u8) {
        self.completion_percentage = percentage.min(100);
        if self.completion_percentage == 100 && self.is_active() {
            self.status = SubmissionStatus::Completed;
        }
    }

    pub fn fail(&mut self) {
        self.status = SubmissionStatus::Failed;
    }

    pub fn cancel(&mut self) {
        self.status = SubmissionStatus::Cancelled;
    }
}

/// Find-by-filter criteria; `None` matches anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionFilter {
    pub content_type: Option<String>,
    pub source_blog_id: Option<BlogId>,
    pub source_id: Option<u64>,
    pub target_blog_id: Option<BlogId>,
    pub statuses: Vec<SubmissionStatus>,
}

impl SubmissionFilter {
    /// Active submissions with the given uniqueness key
    pub fn for_key(key: &SubmissionKey) -> Self {
        Self {
            content_type: Some(key.content_type.clone()),
            source_blog_id: Some(key.source_blog_id),
            source_id: Some(key.source_id),
            target_blog_id: Some(key.target_blog_id),
            statuses: vec![
                SubmissionStatus::New,
                SubmissionStatus::InProgress,
                SubmissionStatus::Completed,
                SubmissionStatus::Failed,
            ],
        }
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        self.content_type
            .as_ref()
            .is_none_or(|ct| *ct == submission.content_type)
            && self.source_blog_id.is_none_or(|id| id == submission.source_blog_id)
            && self.source_id.is_none_or(|id| id == submission.source_id)
            && self.target_blog_id.is_none_or(|id| id == submission.target_blog_id)
            && (self.statuses.is_empty() || self.statuses.contains(&submission.status))
    }
}

/// Persistence port for submissions
pub trait SubmissionStore {
    fn find(&self, filter: &SubmissionFilter) -> TranscodeResult<Vec<Submission>>;

    /// Insert or update; a submission without id gets one
    fn store(&mut self, submission: Submission) -> TranscodeResult<Submission>;

    fn find_by_ids(&self, ids: &[u64]) -> TranscodeResult<Vec<Submission>>;
}

#[derive(Debug, Default)]
pub struct InMemorySubmissionStore {
    submissions: Vec<Submission>,
    next_id: u64,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn find(&self, filter: &SubmissionFilter) -> TranscodeResult<Vec<Submission>> {
        Ok(self
            .submissions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    fn store(&mut self, mut submission: Submission) -> TranscodeResult<Submission> {
        if let Some(id) = submission.id {
            if let Some(existing) = self.submissions.iter_mut().find(|s| s.id == Some(id)) {
                *existing = submission.clone();
                return Ok(submission);
            }
            self.next_id = self.next_id.max(id);
        } else {
            self.next_id += 1;
            submission.id = Some(self.next_id);
        }

        debug!(
            "Stored submission {} for {} {} -> blog {}",
            submission.label(),
            submission.content_type,
            submission.source_id,
            submission.target_blog_id
        );
        self.submissions.push(submission.clone());
        Ok(submission)
    }

    fn find_by_ids(&self, ids: &[u64]) -> TranscodeResult<Vec<Submission>> {
        Ok(self
            .submissions
            .iter()
            .filter(|s| s.id.is_some_and(|id| ids.contains(&id)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(source_id: u64) -> Submission {
        Submission::new("post", 1, source_id, 2, "fr-FR").unwrap()
    }

    #[test]
    fn test_new_submission() {
        let submission = post(5);
        assert_eq!(submission.status, SubmissionStatus::New);
        assert_eq!(submission.id, None);
        assert_eq!(submission.target_id, None);
        assert_eq!(submission.completion_percentage, 0);
    }

    #[test]
    fn test_invalid_locale_rejected() {
        let result = Submission::new("post", 1, 5, 2, "not a locale");
        assert!(matches!(result, Err(TranscodeError::ConfigurationError(_))));
    }

    #[test]
    fn test_lifecycle() {
        let mut submission = post(5);
        submission.mark_in_progress();
        assert_eq!(submission.status, SubmissionStatus::InProgress);

        submission.set_completion(60);
        assert_eq!(submission.status, SubmissionStatus::InProgress);
        submission.set_completion(120);
        assert_eq!(submission.completion_percentage, 100);
        assert_eq!(submission.status, SubmissionStatus::Completed);

        submission.cancel();
        submission.set_completion(100);
        assert_eq!(submission.status, SubmissionStatus::Cancelled);
    }

    #[test]
    fn test_require_target_id() {
        let mut submission = post(5);
        assert!(matches!(
            submission.require_target_id(),
            Err(TranscodeError::MissingReferenceTarget(_))
        ));
        submission.target_id = Some(50);
        assert_eq!(submission.require_target_id().unwrap(), 50);
    }

    #[test]
    fn test_store_assigns_ids_and_updates() {
        let mut store = InMemorySubmissionStore::new();
        let first = store.store(post(5)).unwrap();
        let second = store.store(post(6)).unwrap();
        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));

        let mut updated = first.clone();
        updated.set_completion(100);
        store.store(updated).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.find_by_ids(&[1]).unwrap()[0].status,
            SubmissionStatus::Completed
        );
    }

    #[test]
    fn test_find_by_key_skips_cancelled() {
        let mut store = InMemorySubmissionStore::new();
        let mut cancelled = post(5);
        cancelled.cancel();
        store.store(cancelled.clone()).unwrap();

        let filter = SubmissionFilter::for_key(&cancelled.key());
        assert!(store.find(&filter).unwrap().is_empty());

        store.store(post(5)).unwrap();
        assert_eq!(store.find(&filter).unwrap().len(), 1);
        assert_eq!(store.find(&SubmissionFilter::default()).unwrap().len(), 2);
    }
}
