//! ResultSink trait - Dispatcher output interface
//!
//! Called from worker threads once per finished task, so implementations
//! must tolerate concurrent `persist` calls for the same processor type.

use crate::{ContractError, MultimodalSample, ProcessorId};

/// Per-task result persistence
pub trait ResultSink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist the samples of one finished task
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn persist(
        &self,
        processor: &ProcessorId,
        samples: &[MultimodalSample],
    ) -> Result<(), ContractError>;
}
