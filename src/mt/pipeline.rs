//! Feeding a wire document through a translation backend
//!
//! Every translatable string of the document (plain field values, block
//! content chunks and block attributes) is sent in document order as one
//! batch, and the results are written back into a copy of the document.
//! Whitespace-only strings are not sent.

use tracing::info;

use crate::block::{BlockNode, WireNode};
use crate::document::{FieldPayload, WireDocument};
use crate::error::{TranscodeError, TranscodeResult};
use crate::mt::backend::{TranslationBackend, validate_locale};

fn block_slots<'a>(node: &'a mut BlockNode, slots: &mut Vec<&'a mut String>) {
    for child in node.children.iter_mut() {
        match child {
            WireNode::Block(inner) => block_slots(inner, slots),
            WireNode::Chunk(chunk) => slots.push(&mut chunk.text),
            WireNode::Attribute(attribute) => slots.push(&mut attribute.text),
            WireNode::Unknown(_) => {}
        }
    }
}

/// Mutable references to every translatable string, in document order
fn translatable_slots(document: &mut WireDocument) -> Vec<&mut String> {
    let mut slots = Vec::new();
    for field in document.fields.iter_mut() {
        match &mut field.payload {
            FieldPayload::Text(text) => slots.push(text),
            FieldPayload::Blocks(nodes) => {
                for node in nodes.iter_mut() {
                    block_slots(node, &mut slots);
                }
            }
        }
    }
    slots.retain(|text| !text.trim().is_empty());
    slots
}

/// Translate all strings of a wire document
///
/// # Arguments
///
/// * `document` - The document produced by `ContentDocumentCodec::encode`
/// * `backend` - Provider doing the translation
/// * `source_locale` / `target_locale` - BCP 47 locale codes
///
/// # Returns
///
/// A copy of the document with translated strings; `source` is untouched.
pub async fn translate_document(
    document: &WireDocument,
    backend: &dyn TranslationBackend,
    source_locale: &str,
    target_locale: &str,
) -> TranscodeResult<WireDocument> {
    validate_locale(source_locale)?;
    validate_locale(target_locale)?;

    let mut translated = document.clone();
    let texts: Vec<String> = translatable_slots(&mut translated)
        .into_iter()
        .map(|text| text.clone())
        .collect();

    info!(
        "Translating {} strings {} -> {} with {}",
        texts.len(),
        source_locale,
        target_locale,
        backend.provider_name()
    );

    let results = backend
        .translate_batch(&texts, source_locale, target_locale)
        .await?;

    if results.len() != texts.len() {
        return Err(TranscodeError::ExternalServiceError(format!(
            "{} returned {} translations for {} strings",
            backend.provider_name(),
            results.len(),
            texts.len()
        )));
    }

    for (slot, result) in translatable_slots(&mut translated).into_iter().zip(results) {
        *slot = result;
    }

    Ok(translated)
}
