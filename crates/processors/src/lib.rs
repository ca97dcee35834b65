//! # Processors
//!
//! Processor registry and built-in processors.
//!
//! Responsibilities:
//! - Map capability predicates and cost functions to processor types
//! - Resolve a descriptor to the first processor type that accepts it
//! - Instantiate processors from their flattened configuration
//!
//! ## Usage Example
//!
//! ```
//! use contracts::{Descriptor, FileDescriptor};
//! use processors::ProcessorRegistry;
//!
//! let registry = ProcessorRegistry::builtin();
//! let item: Descriptor = FileDescriptor::new("notes.txt").into();
//! assert_eq!(registry.resolve(&item).unwrap(), "TextProcessor");
//! ```

mod registry;
mod text;
mod url;

pub use registry::{
    AcceptsFn, BuildFn, CostFn, ProcessorKind, ProcessorRegistration, ProcessorRegistry,
};
pub use text::{clean_text, TextProcessor};
pub use url::UrlProcessor;
