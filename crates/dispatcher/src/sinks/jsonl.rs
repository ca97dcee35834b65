//! JsonlSink - appends task results to per-processor JSON-lines files
//!
//! Layout: `<root>/processors/<ProcessorType>/results.jsonl`. A task's
//! samples are encoded up front and appended with a single `write_all`
//! under a per-file lock, so concurrent tasks never interleave lines.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use contracts::{ContractError, MultimodalSample, ProcessorId, ResultSink};
use tracing::{debug, error, instrument};

/// File name of the per-processor results
pub const RESULTS_FILE_NAME: &str = "results.jsonl";

/// JSON-lines result sink
pub struct JsonlSink {
    name: String,
    root: Option<PathBuf>,
    file_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl JsonlSink {
    /// Sink writing under `root`; `None` disables persistence
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            name: "jsonl".to_string(),
            root,
            file_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Results file of a processor type, if persistence is enabled
    pub fn results_path(&self, processor: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| processor_dir(root, processor).join(RESULTS_FILE_NAME))
    }

    fn file_lock(&self, path: &Path) -> Result<Arc<Mutex<()>>, ContractError> {
        let mut locks = self
            .file_locks
            .lock()
            .map_err(|_| ContractError::sink_write(&self.name, "lock table poisoned"))?;
        Ok(Arc::clone(locks.entry(path.to_path_buf()).or_default()))
    }

    fn append(&self, path: &Path, payload: &[u8]) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(payload)
    }
}

fn processor_dir(root: &Path, processor: &str) -> PathBuf {
    root.join("processors").join(processor)
}

fn encode(samples: &[MultimodalSample]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    for sample in samples {
        serde_json::to_writer(&mut buf, sample)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

impl ResultSink for JsonlSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "jsonl_sink_persist",
        skip_all,
        fields(sink = %self.name, processor = %processor, samples = samples.len())
    )]
    fn persist(
        &self,
        processor: &ProcessorId,
        samples: &[MultimodalSample],
    ) -> Result<(), ContractError> {
        let Some(path) = self.results_path(processor) else {
            return Ok(());
        };

        let payload = encode(samples).map_err(|e| {
            ContractError::sink_write(&self.name, format!("cannot encode samples: {e}"))
        })?;

        let lock = self.file_lock(&path)?;
        let _guard = lock
            .lock()
            .map_err(|_| ContractError::sink_write(&self.name, "file lock poisoned"))?;

        self.append(&path, &payload).map_err(|e| {
            error!(sink = %self.name, path = %path.display(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, format!("{}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), bytes = payload.len(), "results appended");
        Ok(())
    }
}
