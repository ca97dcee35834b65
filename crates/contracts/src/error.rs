//! Layered error definitions
//!
//! Categorized by source: config / registry / processor / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Processor-specific configuration is missing or malformed
    #[error("invalid configuration for processor '{processor}': {message}")]
    ProcessorConfig { processor: String, message: String },

    // ===== Registry Errors =====
    /// A processor type with the same name is already registered
    #[error("processor '{name}' is already registered")]
    DuplicateProcessor { name: String },

    /// No registered processor accepts the descriptor
    #[error("no processor found for '{descriptor}'")]
    NoProcessorFound { descriptor: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create processor configuration error
    pub fn processor_config(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProcessorConfig {
            processor: processor.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

/// Failure of a processor on a single item.
///
/// Never aborts a batch: the processor logs it and emits a placeholder sample.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The file could not be opened or read
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file content is not valid in the expected encoding
    #[error("encoding error in '{path}': {message}")]
    Encoding { path: String, message: String },

    /// The content could not be interpreted
    #[error("malformed content in '{path}': {message}")]
    Malformed { path: String, message: String },

    /// The processor does not handle this kind of descriptor
    #[error("processor '{processor}' cannot handle '{descriptor}'")]
    Unsupported {
        processor: String,
        descriptor: String,
    },
}
