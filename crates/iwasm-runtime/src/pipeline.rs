//! Two-stage pipeline: runtime, instance, `prepare_data` per source, then
//! one `aggregate` over everything prepared.
//!
//! A failure at any stage stops the run; nothing produced before it is kept.

use std::fmt;

use thiserror::Error;

use crate::api::{AggregateEnvelope, Aggregation, ApiError, PrepareDataEnvelope, RuntimeHandle};
use crate::wasm::RuntimeConfig;

/// Stage at which a pipeline run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Creating the runtime
    Runtime,
    /// Loading the module
    Instance,
    /// Preparing the source at `index`
    PrepareData {
        /// Position in [`PipelineRequest::sources`]
        index: usize,
    },
    /// Aggregating the prepared data
    Aggregate,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Runtime => write!(f, "runtime"),
            PipelineStage::Instance => write!(f, "instance"),
            PipelineStage::PrepareData { index } => write!(f, "prepare_data[{index}]"),
            PipelineStage::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// A pipeline run that stopped early.
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    /// Where the run stopped
    pub stage: PipelineStage,
    /// What the boundary or the wrapper reported
    #[source]
    pub source: ApiError,
}

impl PipelineError {
    fn at(stage: PipelineStage) -> impl FnOnce(ApiError) -> Self {
        move |source| {
            tracing::warn!(%stage, "pipeline stopped: {source}");
            PipelineError { stage, source }
        }
    }
}

/// Inputs of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    /// Module bytes
    pub module: Vec<u8>,
    /// Config passed to both stages
    pub config: Vec<u8>,
    /// One `prepare_data` request per source
    pub sources: Vec<Vec<u8>>,
    /// Request tag for `aggregate`
    pub request: Vec<u8>,
}

impl PipelineRequest {
    /// Start a request for `module`.
    pub fn new(module: impl Into<Vec<u8>>) -> Self {
        Self {
            module: module.into(),
            ..Self::default()
        }
    }

    /// Builder: set the config passed to both stages
    pub fn config(mut self, config: impl Into<Vec<u8>>) -> Self {
        self.config = config.into();
        self
    }

    /// Builder: add a source request
    pub fn source(mut self, source: impl Into<Vec<u8>>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Builder: set the aggregate request tag
    pub fn request(mut self, request: impl Into<Vec<u8>>) -> Self {
        self.request = request.into();
        self
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Output of each `prepare_data`, in source order
    pub prepared: Vec<Vec<u8>>,
    /// Output of `aggregate`
    pub aggregation: Aggregation,
}

/// Runs [`PipelineRequest`]s on fresh runtimes built from one config.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: RuntimeConfig,
}

impl Pipeline {
    /// Create a pipeline whose runs use `config`.
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Execute every stage in order.
    pub fn run(&self, request: &PipelineRequest) -> Result<PipelineOutput, PipelineError> {
        let runtime = RuntimeHandle::with_config(&self.config)
            .and_then(|runtime| runtime.check().map(|()| runtime))
            .map_err(PipelineError::at(PipelineStage::Runtime))?;

        let instance = runtime
            .create_instance(&request.module)
            .and_then(|instance| instance.check().map(|()| instance))
            .map_err(PipelineError::at(PipelineStage::Instance))?;

        let mut prepared = Vec::with_capacity(request.sources.len());
        for (index, source) in request.sources.iter().enumerate() {
            let data = instance
                .prepare_data(&request.config, source)
                .and_then(PrepareDataEnvelope::into_data)
                .map_err(PipelineError::at(PipelineStage::PrepareData { index }))?;
            tracing::debug!(index, len = data.len(), "source prepared");
            prepared.push(data);
        }

        let batch: Vec<&[u8]> = prepared.iter().map(Vec::as_slice).collect();
        let aggregation = instance
            .aggregate(&request.config, &batch, &request.request)
            .and_then(AggregateEnvelope::into_data)
            .map_err(PipelineError::at(PipelineStage::Aggregate))?;

        tracing::info!(
            sources = prepared.len(),
            result_len = aggregation.result.len(),
            digest_len = aggregation.digest.len(),
            "pipeline complete"
        );
        Ok(PipelineOutput {
            prepared,
            aggregation,
        })
    }
}
