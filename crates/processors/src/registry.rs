//! ProcessorRegistry - capability predicate / cost function / type triples
//!
//! Built once at startup and read-only afterwards. Resolution walks the
//! registrations in order and the first accepting predicate wins.

use std::sync::Arc;

use contracts::{ContractError, Cost, Descriptor, Processor, ProcessorConfig, ProcessorId};
use tracing::{debug, instrument};

use crate::{TextProcessor, UrlProcessor};

/// Capability predicate
pub type AcceptsFn = Arc<dyn Fn(&Descriptor) -> bool + Send + Sync>;

/// Per-item cost function
pub type CostFn = Arc<dyn Fn(&Descriptor) -> Cost + Send + Sync>;

/// Processor constructor
pub type BuildFn =
    Arc<dyn Fn(&ProcessorConfig) -> Result<Arc<dyn Processor>, ContractError> + Send + Sync>;

/// A processor type known at compile time
///
/// Lets a processor describe its own capability, cost and construction so
/// it can be registered with [`ProcessorRegistry::register_kind`].
pub trait ProcessorKind: Processor + Sized + 'static {
    /// Registered type name
    const NAME: &'static str;

    /// Capability predicate
    fn accepts(item: &Descriptor) -> bool;

    /// Batching weight of an item
    fn cost(_item: &Descriptor) -> Cost {
        Cost::Sized(1)
    }

    /// Build an instance from its flattened configuration
    fn build(config: &ProcessorConfig) -> Result<Self, ContractError>;
}

/// One registered processor type
#[derive(Clone)]
pub struct ProcessorRegistration {
    pub id: ProcessorId,
    pub accepts: AcceptsFn,
    pub cost: CostFn,
    pub build: BuildFn,
}

impl std::fmt::Debug for ProcessorRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistration")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Ordered, append-only processor registry
#[derive(Debug, Clone, Default)]
pub struct ProcessorRegistry {
    entries: Vec<ProcessorRegistration>,
    url_processor: Option<ProcessorId>,
}

impl ProcessorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in processors
    ///
    /// `TextProcessor` for `.txt` files and `UrlProcessor` as the URL handler.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        // Names are distinct, registration cannot collide.
        let _ = registry.register_kind::<TextProcessor>();
        let _ = registry.register_url_kind::<UrlProcessor>();
        registry
    }

    /// Register a processor type
    ///
    /// # Errors
    /// `DuplicateProcessor` if the name is already taken.
    #[instrument(
        name = "registry_register",
        skip(self, name, accepts, cost, build),
        fields(processor = name.as_ref())
    )]
    pub fn register(
        &mut self,
        name: impl AsRef<str>,
        accepts: AcceptsFn,
        cost: CostFn,
        build: BuildFn,
    ) -> Result<ProcessorId, ContractError> {
        let name = name.as_ref();
        if self.contains(name) {
            return Err(ContractError::DuplicateProcessor {
                name: name.to_string(),
            });
        }

        let id = ProcessorId::new(name);
        self.entries.push(ProcessorRegistration {
            id: id.clone(),
            accepts,
            cost,
            build,
        });
        debug!(processor = %id, position = self.entries.len() - 1, "processor registered");
        Ok(id)
    }

    /// Register a [`ProcessorKind`]
    pub fn register_kind<P: ProcessorKind>(&mut self) -> Result<ProcessorId, ContractError> {
        self.register(
            P::NAME,
            Arc::new(P::accepts),
            Arc::new(P::cost),
            Arc::new(|config: &ProcessorConfig| {
                P::build(config).map(|p| Arc::new(p) as Arc<dyn Processor>)
            }),
        )
    }

    /// Register a [`ProcessorKind`] and make it the URL handler
    pub fn register_url_kind<P: ProcessorKind>(&mut self) -> Result<ProcessorId, ContractError> {
        let id = self.register_kind::<P>()?;
        self.url_processor = Some(id.clone());
        Ok(id)
    }

    /// Mark an already registered type as the URL handler
    pub fn set_url_processor(&mut self, name: &str) -> Result<(), ContractError> {
        let id = self
            .get(name)
            .map(|entry| entry.id.clone())
            .ok_or_else(|| {
                ContractError::config_validation(
                    "url_processor",
                    format!("processor '{name}' is not registered"),
                )
            })?;
        self.url_processor = Some(id);
        Ok(())
    }

    /// The dedicated URL processor type, if any
    pub fn url_processor(&self) -> Option<&ProcessorId> {
        self.url_processor.as_ref()
    }

    /// First registered type accepting `item`
    ///
    /// URLs resolve to the URL processor without consulting predicates.
    ///
    /// # Errors
    /// `NoProcessorFound` if nothing accepts the item.
    pub fn resolve(&self, item: &Descriptor) -> Result<&ProcessorId, ContractError> {
        let found = match item {
            Descriptor::Url(_) => self.url_processor.as_ref(),
            Descriptor::File(_) => self
                .entries
                .iter()
                .find(|entry| (entry.accepts)(item))
                .map(|entry| &entry.id),
        };

        found.ok_or_else(|| ContractError::NoProcessorFound {
            descriptor: item.source(),
        })
    }

    /// Every registered type, in registration order
    pub fn list_all(&self) -> impl Iterator<Item = &ProcessorId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    /// Registration for a type name
    pub fn get(&self, name: &str) -> Option<&ProcessorRegistration> {
        self.entries.iter().find(|entry| entry.id == name)
    }

    /// True if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cost of `item` under processor type `name`
    ///
    /// Unknown types report [`Cost::Unsized`].
    pub fn cost(&self, name: &str, item: &Descriptor) -> Cost {
        self.get(name)
            .map(|entry| (entry.cost)(item))
            .unwrap_or(Cost::Unsized)
    }

    /// Build a processor instance
    ///
    /// # Errors
    /// Configuration error naming the processor type when it is unknown or
    /// its constructor rejects the configuration.
    pub fn instantiate(
        &self,
        name: &str,
        config: &ProcessorConfig,
    ) -> Result<Arc<dyn Processor>, ContractError> {
        let entry = self
            .get(name)
            .ok_or_else(|| ContractError::processor_config(name, "processor is not registered"))?;

        (entry.build)(config).map_err(|e| match e {
            ContractError::ProcessorConfig { .. } => e,
            other => ContractError::processor_config(name, other.to_string()),
        })
    }
}
