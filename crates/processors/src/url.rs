//! UrlProcessor - handler for every discovered URL
//!
//! Fetching and extraction are external; this processor records the URL as
//! a sample so URL tasks flow through batching, execution and persistence.

use contracts::{
    ContractError, Cost, Descriptor, MultimodalSample, Processor, ProcessorConfig,
    ProcessorError,
};

use crate::ProcessorKind;

#[derive(Debug, Clone, Default)]
pub struct UrlProcessor;

impl ProcessorKind for UrlProcessor {
    const NAME: &'static str = "UrlProcessor";

    fn accepts(item: &Descriptor) -> bool {
        item.as_url().is_some()
    }

    fn cost(_item: &Descriptor) -> Cost {
        Cost::Sized(1)
    }

    fn build(_config: &ProcessorConfig) -> Result<Self, ContractError> {
        Ok(Self)
    }
}

impl Processor for UrlProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process_one(
        &self,
        item: &Descriptor,
        _fast: bool,
    ) -> Result<MultimodalSample, ProcessorError> {
        let url = item.as_url().ok_or_else(|| ProcessorError::Unsupported {
            processor: Self::NAME.to_string(),
            descriptor: item.source(),
        })?;

        let host = url
            .url
            .split_once("://")
            .map(|(_, rest)| rest.split('/').next().unwrap_or_default())
            .unwrap_or_default();
        if host.is_empty() {
            return Err(ProcessorError::Malformed {
                path: url.url.clone(),
                message: "URL has no host".into(),
            });
        }

        Ok(MultimodalSample::new(Vec::new(), Vec::new(), url.url.clone())
            .with_metadata("host", host.into()))
    }
}
