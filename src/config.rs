//! Transcoder configuration
//!
//! Settings are plain JSON. Every key is optional:
//!
//! ```json
//! {
//!     "filter": {
//!         "ignore": ["_edit_lock", "_edit_last"],
//!         "copy_by_name": ["guid", "_thumbnail_id"],
//!         "copy_by_regex": ["^\\d+(,\\d+)*$"],
//!         "drop_empty": true,
//!         "key": { "seo": ["_yoast_wpseo_"] }
//!     },
//!     "normalize_roots": ["meta"],
//!     "coerce_numeric_strings": true,
//!     "process_blocks": true,
//!     "source_line_width": 80
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{TranscodeError, TranscodeResult};
use crate::filter::FilterConfig;

/// Options shared by the document and block codecs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub filter: FilterConfig,
    /// Top-level keys whose one-element values collapse to the element
    pub normalize_roots: Vec<String>,
    /// Turn purely numeric translated strings back into numbers on decode
    pub coerce_numeric_strings: bool,
    /// Expand block markup in string fields into block wire nodes
    pub process_blocks: bool,
    /// Column width of the encoded source snapshot
    pub source_line_width: usize,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            normalize_roots: vec!["meta".to_string()],
            coerce_numeric_strings: true,
            process_blocks: true,
            source_line_width: 80,
        }
    }
}

impl TranscoderConfig {
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    fn validate(self) -> TranscodeResult<Self> {
        if self.source_line_width == 0 {
            return Err(TranscodeError::ConfigurationError(
                "source_line_width must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Parse a configuration from a JSON string
pub fn load_config_from_str(content: &str) -> TranscodeResult<TranscoderConfig> {
    let config: TranscoderConfig = serde_json::from_str(content)?;
    config.validate()
}

/// Load a configuration from a JSON file
pub fn load_config_from_file(path: &Path) -> TranscodeResult<TranscoderConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        TranscodeError::ConfigurationError(format!(
            "Failed to read config '{}': {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&content).map_err(|e| match e {
        TranscodeError::Json(e) => TranscodeError::ConfigurationError(format!(
            "Failed to parse config '{}': {}",
            path.display(),
            e
        )),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TranscoderConfig::default();
        assert_eq!(config.normalize_roots, vec!["meta"]);
        assert!(config.coerce_numeric_strings);
        assert!(config.process_blocks);
        assert_eq!(config.source_line_width, 80);
        assert!(config.filter.drop_empty);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = load_config_from_str(r#"{"filter": {"ignore": ["_edit_lock"]}}"#).unwrap();
        assert_eq!(config.filter.ignore, vec!["_edit_lock"]);
        assert!(config.filter.drop_empty);
        assert_eq!(config.source_line_width, 80);
    }

    #[test]
    fn test_key_classes_keep_order() {
        let config = load_config_from_str(
            r#"{"filter": {"key": {"seo": ["_yoast"], "title": ["post_title"]}}}"#,
        )
        .unwrap();
        let classes: Vec<&String> = config.filter.key.keys().collect();
        assert_eq!(classes, vec!["seo", "title"]);
    }

    #[test]
    fn test_zero_line_width_rejected() {
        let result = load_config_from_str(r#"{"source_line_width": 0}"#);
        assert!(matches!(result, Err(TranscodeError::ConfigurationError(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{not json"),
            Err(TranscodeError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config_from_file(Path::new("/nonexistent/transcoder.json"));
        assert!(matches!(result, Err(TranscodeError::ConfigurationError(msg)) if msg.contains("Failed to read")));
    }
}
