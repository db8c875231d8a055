//! Translation backend trait
//!
//! The wire document leaves this crate through a `TranslationBackend`. The
//! real backend (upload, wait, download) is an external collaborator; this
//! crate ships a deterministic mock for tests and the CLI.
//!
//! # Example
//!
//! ```ignore
//! use content_transcoder::mt::{MockBackend, MockMode, TranslationBackend};
//!
//! let backend = MockBackend::new(MockMode::Suffix);
//! let texts = vec!["Hello".to_string(), "Goodbye".to_string()];
//! let results = backend.translate_batch(&texts, "en", "fr").await?;
//! assert_eq!(results, vec!["Hello_fr", "Goodbye_fr"]);
//! ```

use async_trait::async_trait;
use icu_locale::Locale;

use crate::error::{TranscodeError, TranscodeResult};

/// Generic trait for translation providers
///
/// All methods are async to support I/O-bound providers.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate multiple strings in a single batch operation
    ///
    /// # Arguments
    ///
    /// * `texts` - Strings to translate
    /// * `source_locale` - Source locale (e.g., "en", "en-US")
    /// * `target_locale` - Target locale (e.g., "fr", "fr-FR")
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - Translations in input order, one per input
    /// * `Err(TranscodeError::ExternalServiceError)` - If the provider fails
    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> TranscodeResult<Vec<String>>;

    /// Translate a single string
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> TranscodeResult<String> {
        let texts = [text.to_string()];
        let mut results = self
            .translate_batch(&texts, source_locale, target_locale)
            .await?;
        results.pop().ok_or_else(|| {
            TranscodeError::ExternalServiceError(format!(
                "{} returned no translation",
                self.provider_name()
            ))
        })
    }

    /// Name of this provider, used for logging
    fn provider_name(&self) -> &str;
}

/// Validate a locale code against BCP 47
///
/// # Example
///
/// ```ignore
/// validate_locale("fr-FR")?; // OK
/// validate_locale("invalid@code").unwrap_err(); // Error
/// ```
pub fn validate_locale(locale: &str) -> TranscodeResult<()> {
    if locale.is_empty() {
        return Err(TranscodeError::ConfigurationError(
            "Locale code is empty".to_string(),
        ));
    }

    locale.parse::<Locale>().map(|_| ()).map_err(|e| {
        TranscodeError::ConfigurationError(format!("Invalid locale '{}': {:?}", locale, e))
    })
}
