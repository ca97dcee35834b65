//! Result sinks

mod jsonl;

pub use self::jsonl::{JsonlSink, RESULTS_FILE_NAME};
