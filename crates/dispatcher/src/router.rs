//! CapabilityRouter - partitions discovered items into per-processor buckets

use contracts::{
    ContractError, Descriptor, DispatcherReadyResult, FileDescriptor, ProcessorId, UrlDescriptor,
};
use processors::ProcessorRegistry;
use tracing::{debug, instrument, warn};

/// Processor type -> items, in registration order
///
/// Every registered type has an entry, possibly empty. Items keep their
/// input order inside a bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    entries: Vec<(ProcessorId, Vec<Descriptor>)>,
    unrouted: Vec<Descriptor>,
}

impl Buckets {
    fn with_types<'a>(types: impl Iterator<Item = &'a ProcessorId>) -> Self {
        Self {
            entries: types.map(|id| (id.clone(), Vec::new())).collect(),
            unrouted: Vec::new(),
        }
    }

    fn push(&mut self, processor: &ProcessorId, item: Descriptor) {
        if let Some((_, items)) = self.entries.iter_mut().find(|(id, _)| id == processor) {
            items.push(item);
        }
    }

    /// Items routed to `processor`
    pub fn get(&self, processor: &str) -> Option<&[Descriptor]> {
        self.entries
            .iter()
            .find(|(id, _)| id == processor)
            .map(|(_, items)| items.as_slice())
    }

    /// All buckets, empty ones included
    pub fn iter(&self) -> impl Iterator<Item = (&ProcessorId, &[Descriptor])> {
        self.entries.iter().map(|(id, items)| (id, items.as_slice()))
    }

    /// Consume into `(type, items)` pairs
    pub fn into_entries(self) -> Vec<(ProcessorId, Vec<Descriptor>)> {
        self.entries
    }

    /// Items no processor accepted
    pub fn unrouted(&self) -> &[Descriptor] {
        &self.unrouted
    }

    /// Number of routed items across all buckets
    pub fn routed_count(&self) -> usize {
        self.entries.iter().map(|(_, items)| items.len()).sum()
    }
}

/// Routes descriptors to processor types using the registry
pub struct CapabilityRouter<'a> {
    registry: &'a ProcessorRegistry,
    fallback: Option<ProcessorId>,
}

impl<'a> CapabilityRouter<'a> {
    pub fn new(registry: &'a ProcessorRegistry) -> Self {
        Self {
            registry,
            fallback: None,
        }
    }

    /// Send files no predicate accepts to `fallback`
    ///
    /// # Errors
    /// The fallback must be a registered type.
    pub fn with_fallback(mut self, fallback: &str) -> Result<Self, ContractError> {
        let entry = self.registry.get(fallback).ok_or_else(|| {
            ContractError::config_validation(
                "fallback_processor",
                format!("processor '{fallback}' is not registered"),
            )
        })?;
        self.fallback = Some(entry.id.clone());
        Ok(self)
    }

    /// Route a discovery result
    pub fn route_result(&self, result: &DispatcherReadyResult) -> Buckets {
        self.route(result.files(), &result.urls)
    }

    /// Route files by capability and URLs to the URL processor
    #[instrument(name = "router_route", skip_all, fields(urls = urls.len()))]
    pub fn route<'f>(
        &self,
        files: impl IntoIterator<Item = &'f FileDescriptor>,
        urls: &[UrlDescriptor],
    ) -> Buckets {
        let mut buckets = Buckets::with_types(self.registry.list_all());

        for file in files {
            let item = Descriptor::File(file.clone());
            match self.registry.resolve(&item) {
                Ok(processor) => {
                    debug!(file = %item, processor = %processor, "assigned file");
                    buckets.push(processor, item);
                }
                Err(_) => match &self.fallback {
                    Some(fallback) => {
                        debug!(file = %item, processor = %fallback, "assigned file to fallback");
                        buckets.push(fallback, item);
                    }
                    None => {
                        warn!(file = %item, "no processor found, skipping");
                        observability::record_item_unrouted();
                        buckets.unrouted.push(item);
                    }
                },
            }
        }

        match self.registry.url_processor() {
            Some(url_processor) => {
                for url in urls {
                    buckets.push(url_processor, Descriptor::Url(url.clone()));
                }
            }
            None => {
                for url in urls {
                    warn!(url = %url.url, "no URL processor registered, skipping");
                    observability::record_item_unrouted();
                    buckets.unrouted.push(Descriptor::Url(url.clone()));
                }
            }
        }

        for (processor, items) in buckets.iter() {
            if !items.is_empty() {
                observability::record_items_routed(processor, items.len());
            }
        }

        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> DispatcherReadyResult {
        let mut result = DispatcherReadyResult::new();
        result.add_files(
            "/data",
            vec![
                FileDescriptor::new("/data/a.txt"),
                FileDescriptor::new("/data/movie.mp4"),
                FileDescriptor::new("/data/b.txt"),
            ],
        );
        result.add_url("https://example.com/1");
        result.add_url("https://example.com/2");
        result
    }

    #[test]
    fn test_every_registered_type_has_bucket() {
        let registry = ProcessorRegistry::builtin();
        let buckets = CapabilityRouter::new(&registry).route(std::iter::empty(), &[]);

        let names: Vec<_> = buckets.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(names, vec!["TextProcessor", "UrlProcessor"]);
        assert!(buckets.iter().all(|(_, items)| items.is_empty()));
    }

    #[test]
    fn test_routes_in_input_order() {
        let registry = ProcessorRegistry::builtin();
        let buckets = CapabilityRouter::new(&registry).route_result(&discovery());

        let text: Vec<_> = buckets
            .get("TextProcessor")
            .unwrap()
            .iter()
            .map(Descriptor::source)
            .collect();
        assert_eq!(text, vec!["/data/a.txt", "/data/b.txt"]);
        assert_eq!(buckets.get("UrlProcessor").unwrap().len(), 2);
        assert_eq!(buckets.unrouted().len(), 1);
        assert_eq!(buckets.routed_count(), 4);
    }

    #[test]
    fn test_fallback_receives_unmatched() {
        let registry = ProcessorRegistry::builtin();
        let buckets = CapabilityRouter::new(&registry)
            .with_fallback("TextProcessor")
            .unwrap()
            .route_result(&discovery());

        assert_eq!(buckets.get("TextProcessor").unwrap().len(), 3);
        assert!(buckets.unrouted().is_empty());
    }

    #[test]
    fn test_unknown_fallback_rejected() {
        let registry = ProcessorRegistry::builtin();
        assert!(CapabilityRouter::new(&registry)
            .with_fallback("PdfProcessor")
            .is_err());
    }

    #[test]
    fn test_routing_is_deterministic() {
        let registry = ProcessorRegistry::builtin();
        let router = CapabilityRouter::new(&registry);
        let input = discovery();
        assert_eq!(router.route_result(&input), router.route_result(&input));
    }
}
