//! Last-modified check job
//!
//! Polls the translation service for file sets queued after upload. When a
//! file changed since the last poll, the submissions of that file get their
//! completion refreshed, and those at 100% are queued for download.
//!
//! A failing file set is logged and skipped; the job moves on to the next.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error, info, warn};

use crate::error::{TranscodeError, TranscodeResult};
use crate::resolver::{Submission, SubmissionStore};

pub const LAST_MODIFIED_CHECK_QUEUE: &str = "last-modified-check-queue";
pub const DOWNLOAD_QUEUE: &str = "download-queue";

/// Payload of a queue entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueMessage {
    /// File URI to the ids of the submissions uploaded in that file
    FileSets(IndexMap<String, Vec<u64>>),
    /// Submission ids
    Submissions(Vec<u64>),
}

/// Named FIFO queues
pub trait WorkQueue {
    fn dequeue(&mut self, queue: &str) -> TranscodeResult<Option<QueueMessage>>;

    fn enqueue(&mut self, queue: &str, message: QueueMessage) -> TranscodeResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: HashMap<String, VecDeque<QueueMessage>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, queue: &str) -> Vec<&QueueMessage> {
        self.queues
            .get(queue)
            .map(|q| q.iter().collect())
            .unwrap_or_default()
    }
}

impl WorkQueue for InMemoryQueue {
    fn dequeue(&mut self, queue: &str) -> TranscodeResult<Option<QueueMessage>> {
        Ok(self.queues.get_mut(queue).and_then(VecDeque::pop_front))
    }

    fn enqueue(&mut self, queue: &str, message: QueueMessage) -> TranscodeResult<()> {
        self.queues
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
        Ok(())
    }
}

/// File status calls of the translation service
#[async_trait]
pub trait TranslationApi: Send + Sync {
    /// Last modification time per service locale of the file holding `submission`
    async fn last_modified(
        &self,
        submission: &Submission,
    ) -> TranscodeResult<HashMap<String, DateTime<Utc>>>;

    /// Submissions with refreshed completion, one per given locale
    async fn status_for_all_locales(
        &self,
        submissions: &IndexMap<String, Submission>,
    ) -> TranscodeResult<Vec<Submission>>;
}

/// Maps a submission to the locale id used by the translation service
pub trait LocaleMapper {
    fn service_locale(&self, submission: &Submission) -> TranscodeResult<String>;
}

/// Uses the submission's own target locale
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetLocaleMapper;

impl LocaleMapper for TargetLocaleMapper {
    fn service_locale(&self, submission: &Submission) -> TranscodeResult<String> {
        Ok(submission.target_locale.clone())
    }
}

/// Outcome of one job run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub processed_batches: usize,
    pub failed_batches: usize,
    pub enqueued_downloads: usize,
}

/// Keep the submissions whose file changed and record the new time on them
pub fn filter_submissions(
    last_modified: &HashMap<String, DateTime<Utc>>,
    submissions: IndexMap<String, Submission>,
) -> IndexMap<String, Submission> {
    submissions
        .into_iter()
        .filter_map(|(locale, mut submission)| {
            let actual = *last_modified.get(&locale)?;
            if submission.last_modified == Some(actual) {
                debug!(
                    "Submission {} unchanged since {}",
                    submission.label(),
                    actual
                );
                return None;
            }
            submission.last_modified = Some(actual);
            Some((locale, submission))
        })
        .collect()
}

pub struct LastModifiedCheckJob<A, S, Q, L> {
    api: A,
    store: S,
    queue: Q,
    locales: L,
}

impl<A, S, Q, L> LastModifiedCheckJob<A, S, Q, L>
where
    A: TranslationApi,
    S: SubmissionStore,
    Q: WorkQueue,
    L: LocaleMapper,
{
    pub fn new(api: A, store: S, queue: Q, locales: L) -> Self {
        Self {
            api,
            store,
            queue,
            locales,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Drain the check queue
    ///
    /// # Errors
    ///
    /// Only errors that are not recoverable per file set abort the run.
    pub async fn run(&mut self) -> TranscodeResult<JobReport> {
        info!("Started Last-Modified Check Job.");
        let mut report = JobReport::default();

        while let Some(message) = self.queue.dequeue(LAST_MODIFIED_CHECK_QUEUE)? {
            let QueueMessage::FileSets(file_sets) = message else {
                warn!("Skipping unexpected message on {}", LAST_MODIFIED_CHECK_QUEUE);
                continue;
            };

            for (file_uri, ids) in file_sets {
                match self.process_file_set(&file_uri, &ids).await {
                    Ok(enqueued) => {
                        report.processed_batches += 1;
                        report.enqueued_downloads += enqueued;
                    }
                    Err(e) if e.is_recoverable() => {
                        error!(
                            "An exception has occurred while checking file '{}'. Message: {}.",
                            file_uri, e
                        );
                        report.failed_batches += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!("Finished Last-Modified Check Job.");
        Ok(report)
    }

    async fn process_file_set(&mut self, file_uri: &str, ids: &[u64]) -> TranscodeResult<usize> {
        let submissions = self.store.find_by_ids(ids)?;
        let Some(first) = submissions.first() else {
            debug!("No submissions left for file '{}'", file_uri);
            return Ok(0);
        };

        let last_modified = self.api.last_modified(first).await?;
        let by_locale = self.prepare_submission_list(submissions)?;
        let changed = filter_submissions(&last_modified, by_locale);

        let stored = changed
            .into_values()
            .map(|submission| self.store.store(submission))
            .collect::<TranscodeResult<Vec<_>>>()?;
        if stored.is_empty() {
            return Ok(0);
        }

        self.status_check(stored).await
    }

    /// Refresh completion and enqueue finished submissions for download
    ///
    /// Returns how many submissions were enqueued.
    pub async fn status_check(&mut self, submissions: Vec<Submission>) -> TranscodeResult<usize> {
        debug!("Processing status check for {} submissions.", submissions.len());

        let by_locale = self.prepare_submission_list(submissions)?;
        let updated = self.api.status_for_all_locales(&by_locale).await?;

        let mut enqueued = 0;
        for submission in updated {
            let submission = self.store.store(submission)?;
            if self.check_entity_for_download(&submission)? {
                enqueued += 1;
            }
        }

        debug!("Processing status check finished.");
        Ok(enqueued)
    }

    /// Enqueue a fully translated submission; returns whether it was enqueued
    pub fn check_entity_for_download(&mut self, submission: &Submission) -> TranscodeResult<bool> {
        if submission.completion_percentage != 100 {
            return Ok(false);
        }
        let id = submission.id.ok_or_else(|| {
            TranscodeError::MissingReferenceTarget(format!(
                "Submission {} was never stored",
                submission.label()
            ))
        })?;

        info!(
            "Cron Job enqueues content to download queue for submission id = '{}' with status = '{}' for entity = '{}', blog = '{}', id = '{}', targetBlog = '{}', locale = '{}'.",
            id,
            submission.status.as_str(),
            submission.content_type,
            submission.source_blog_id,
            submission.source_id,
            submission.target_blog_id,
            submission.target_locale
        );
        self.queue
            .enqueue(DOWNLOAD_QUEUE, QueueMessage::Submissions(vec![id]))?;
        Ok(true)
    }

    /// Key submissions by service locale; a later submission wins a shared locale
    fn prepare_submission_list(
        &self,
        submissions: Vec<Submission>,
    ) -> TranscodeResult<IndexMap<String, Submission>> {
        submissions
            .into_iter()
            .map(|submission| -> TranscodeResult<(String, Submission)> {
                Ok((self.locales.service_locale(&submission)?, submission))
            })
            .collect()
    }
}
