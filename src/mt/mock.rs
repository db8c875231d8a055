//! Deterministic translation backend
//!
//! Stands in for the external translation service in tests and in the
//! `roundtrip` command. Every batch it receives is recorded, so callers can
//! check that a document went out as a single request.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{TranscodeError, TranscodeResult};
use crate::mt::backend::TranslationBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockMode {
    /// Tag each field with the target locale: "Hello" → "Hello_fr"
    Suffix,

    /// Send every field back unchanged
    NoOp,

    /// Reject the batch with this message
    Error(String),
}

#[derive(Debug)]
pub struct MockBackend {
    mode: MockMode,
    batches: Mutex<Vec<Vec<String>>>,
}

impl MockBackend {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Batches received so far, in arrival order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate_batch(
        &self,
        texts: &[String],
        _source_locale: &str,
        target_locale: &str,
    ) -> TranscodeResult<Vec<String>> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(texts.to_vec());
        }

        match &self.mode {
            MockMode::Suffix => Ok(texts
                .iter()
                .map(|text| format!("{}_{}", text, target_locale))
                .collect()),
            MockMode::NoOp => Ok(texts.to_vec()),
            MockMode::Error(message) => Err(TranscodeError::ExternalServiceError(message.clone())),
        }
    }

    fn provider_name(&self) -> &str {
        "Mock Backend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_suffix_tags_each_field() {
        let mock = MockBackend::new(MockMode::Suffix);
        let texts = vec!["Hello".to_string(), "<p>Body</p>".to_string()];
        let results = mock.translate_batch(&texts, "en", "fr").await.unwrap();
        assert_eq!(results, vec!["Hello_fr", "<p>Body</p>_fr"]);
    }

    #[tokio::test]
    async fn test_noop_returns_fields_unchanged() {
        let mock = MockBackend::new(MockMode::NoOp);
        let texts = vec!["Fish & Chips".to_string(), "".to_string()];
        let results = mock.translate_batch(&texts, "en", "fr").await.unwrap();
        assert_eq!(results, texts);
    }

    #[tokio::test]
    async fn test_error_rejects_batch() {
        let mock = MockBackend::new(MockMode::Error("quota exceeded".to_string()));
        let result = mock.translate("hello", "en", "fr").await;
        assert!(matches!(result, Err(TranscodeError::ExternalServiceError(msg)) if msg == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_batches_are_recorded() {
        let mock = MockBackend::new(MockMode::Suffix);
        mock.translate_batch(&["a".to_string(), "b".to_string()], "en", "de")
            .await
            .unwrap();
        mock.translate("c", "en", "de").await.unwrap();

        assert_eq!(
            mock.batches(),
            vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]
        );
        assert_eq!(mock.provider_name(), "Mock Backend");
    }
}
