//! MultimodalSample - processor output record
//!
//! One sample per processed item, persisted as one JSON line.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Non-text content attached to a sample (image, audio, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modality {
    /// Kind of content, e.g. "image"
    #[serde(rename = "type")]
    pub modality_type: String,

    /// Location or inline value of the content
    pub value: String,
}

/// Provenance of a sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// Source file path or URL
    pub file_path: String,

    /// Processor-specific metadata
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Extracted content of one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultimodalSample {
    /// Extracted text
    pub text: String,

    /// Attached non-text content
    #[serde(default)]
    pub modalities: Vec<Modality>,

    /// Source metadata
    pub metadata: SampleMetadata,
}

impl MultimodalSample {
    /// Create a sample from text chunks; chunks are joined with a newline
    pub fn new(texts: Vec<String>, modalities: Vec<Modality>, source: impl Into<String>) -> Self {
        Self {
            text: texts.join("\n"),
            modalities,
            metadata: SampleMetadata {
                file_path: source.into(),
                extra: BTreeMap::new(),
            },
        }
    }

    /// Empty sample standing in for an item that failed to process
    pub fn placeholder(source: impl Into<String>) -> Self {
        Self::new(Vec::new(), Vec::new(), source)
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.extra.insert(key.into(), value);
        self
    }

    /// True for samples with neither text nor modalities
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.modalities.is_empty()
    }
}
