//! TextProcessor - plain `.txt` files

use contracts::{
    ContractError, Descriptor, MultimodalSample, Processor, ProcessorConfig, ProcessorError,
};
use tracing::{error, instrument};

use crate::ProcessorKind;

/// Reads a UTF-8 text file and emits its cleaned content as one sample
#[derive(Debug, Clone)]
pub struct TextProcessor {
    /// Keep blank-line runs as they are instead of collapsing them
    keep_blank_lines: bool,
}

impl TextProcessor {
    pub fn new(keep_blank_lines: bool) -> Self {
        Self { keep_blank_lines }
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ProcessorKind for TextProcessor {
    const NAME: &'static str = "TextProcessor";

    fn accepts(item: &Descriptor) -> bool {
        item.as_file()
            .is_some_and(|file| file.file_extension == ".txt")
    }

    fn build(config: &ProcessorConfig) -> Result<Self, ContractError> {
        Ok(Self::new(config.get_bool_or("keep_blank_lines", false)))
    }
}

impl Processor for TextProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(name = "text_processor_process_one", skip(self, item), fields(item = %item))]
    fn process_one(
        &self,
        item: &Descriptor,
        _fast: bool,
    ) -> Result<MultimodalSample, ProcessorError> {
        let file = item.as_file().ok_or_else(|| ProcessorError::Unsupported {
            processor: Self::NAME.to_string(),
            descriptor: item.source(),
        })?;
        let path = file.display_path();

        let bytes = std::fs::read(&file.file_path).map_err(|source| {
            error!(path = %path, error = %source, "Failed to read file");
            ProcessorError::Read {
                path: path.clone(),
                source,
            }
        })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            error!(path = %path, error = %e, "Encoding error");
            ProcessorError::Encoding {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;

        let cleaned = if self.keep_blank_lines {
            text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
        } else {
            clean_text(&text)
        };

        Ok(MultimodalSample::new(vec![cleaned], Vec::new(), path))
    }
}

/// Normalize extracted text
///
/// Drops control characters other than tab/newline, trims trailing
/// whitespace on every line, collapses runs of blank lines to one and trims
/// the whole text.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.lines() {
        let line: String = line
            .chars()
            .filter(|c| !c.is_control() || *c == '\t')
            .collect();
        let line = line.trim_end();

        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }

        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}
