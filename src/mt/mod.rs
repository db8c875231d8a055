/// Translation backends
///
/// This module connects a wire document to a translation provider:
///
/// 1. **Backend trait** - `TranslationBackend`, async, one batch per document
/// 2. **Mock backend** - deterministic provider for tests and the CLI
/// 3. **Pipeline** - `translate_document`, which extracts every translatable
///    string (fields, block chunks, block attributes) in order and writes the
///    translations back
///
/// # Example
///
/// ```ignore
/// use content_transcoder::mt::{MockBackend, MockMode, translate_document};
///
/// let document = codec.encode(&tree)?;
/// let backend = MockBackend::new(MockMode::Suffix);
/// let translated = translate_document(&document, &backend, "en", "fr").await?;
/// let tree_fr = codec.decode(&translated)?;
/// ```
pub mod backend;
pub mod mock;
pub mod pipeline;

pub use backend::{TranslationBackend, validate_locale};
pub use mock::{MockBackend, MockMode};
pub use pipeline::translate_document;
