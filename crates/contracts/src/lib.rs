//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the dispatch engine.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data flow
//! - Discovery produces a [`DispatcherReadyResult`] of [`FileDescriptor`]s and [`UrlDescriptor`]s
//! - The dispatcher routes each [`Descriptor`] to a [`Processor`] identified by a [`ProcessorId`]
//! - Processors emit [`MultimodalSample`]s, persisted through a [`ResultSink`]

mod config;
mod descriptor;
mod error;
mod processor;
mod processor_id;
mod sample;
mod sink;

pub use config::*;
pub use descriptor::*;
pub use error::*;
pub use processor::*;
pub use processor_id::ProcessorId;
pub use sample::*;
pub use sink::*;
