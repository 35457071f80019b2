//! Step factories keyed by the `type` of a step in a pipeline document.

use std::collections::HashMap;

use super::{FileListSink, Filter, ListDir, NullSink, NullSource, NullStage};
use crate::error::{Result, TroilkattError};
use crate::pipeline::{BuiltStep, Sink, Source, Stage, StepHandle};
use crate::{StepConfig, StepKind};

pub type SourceFactory = Box<dyn Fn(&StepConfig) -> Result<Box<dyn Source>>>;
pub type StageFactory = Box<dyn Fn(&StepConfig) -> Result<Box<dyn Stage>>>;
pub type SinkFactory = Box<dyn Fn(&StepConfig) -> Result<Box<dyn Sink>>>;

/// Maps step type names to constructors, separately per kind.
pub struct StepRegistry {
    sources: HashMap<String, SourceFactory>,
    stages: HashMap<String, StageFactory>,
    sinks: HashMap<String, SinkFactory>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl StepRegistry {
    /// A registry with no step types.
    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
            stages: HashMap::new(),
            sinks: HashMap::new(),
        }
    }

    /// A registry with the built-in step types.
    pub fn with_builtins() -> Self {
        let mut r = Self::empty();
        r.register_source("null_source", |_| Ok(Box::new(NullSource)));
        r.register_source("list_dir", |c| Ok(Box::new(ListDir::new(c)?)));
        r.register_stage("null_stage", |_| Ok(Box::new(NullStage)));
        r.register_stage("filter", |c| Ok(Box::new(Filter::new(c)?)));
        r.register_sink("null_sink", |_| Ok(Box::new(NullSink)));
        r.register_sink("file_list", |c| Ok(Box::new(FileListSink::new(c)?)));
        r
    }

    /// Register (or replace) a source type.
    pub fn register_source<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&StepConfig) -> Result<Box<dyn Source>> + 'static,
    {
        self.sources.insert(type_name.to_string(), Box::new(factory));
    }

    pub fn register_stage<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&StepConfig) -> Result<Box<dyn Stage>> + 'static,
    {
        self.stages.insert(type_name.to_string(), Box::new(factory));
    }

    pub fn register_sink<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&StepConfig) -> Result<Box<dyn Sink>> + 'static,
    {
        self.sinks.insert(type_name.to_string(), Box::new(factory));
    }

    /// Construct a step of `type_name` for `config`, dispatching on `config.kind`.
    pub fn build(&self, type_name: &str, config: StepConfig) -> Result<BuiltStep> {
        let unknown = |config: &StepConfig| TroilkattError::StepInit {
            step: config.id.clone(),
            message: format!("unknown {} type: {type_name}", config.kind),
        };
        match config.kind {
            StepKind::Source => {
                let factory = self.sources.get(type_name).ok_or_else(|| unknown(&config))?;
                let step = factory(&config)?;
                Ok(BuiltStep::Source(StepHandle::new(config, step)))
            }
            StepKind::Middle => {
                let factory = self.stages.get(type_name).ok_or_else(|| unknown(&config))?;
                let step = factory(&config)?;
                Ok(BuiltStep::Stage(StepHandle::new(config, step)))
            }
            StepKind::Sink => {
                let factory = self.sinks.get(type_name).ok_or_else(|| unknown(&config))?;
                let step = factory(&config)?;
                Ok(BuiltStep::Sink(StepHandle::new(config, step)))
            }
        }
    }
}
