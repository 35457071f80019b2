//! Pipeline manifest and pipeline documents.
//!
//! The manifest lists one pipeline document per line (`#` starts a comment line). Each document
//! is TOML with one `[source]`, any number of `[[stage]]` tables and one `[sink]`; the pipeline is
//! named after the document's file stem.

use log::{debug, info};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::runner::Pipeline;
use crate::error::{Result, TroilkattError};
use crate::steps::StepRegistry;
use crate::storage::{CompressionTag, Storage};
use crate::utils::config::{PIPELINE_DOC_EXTENSION, StepDefaults, TroilkattConfig};
use crate::{StepConfig, StepKind};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineDoc {
    source: StepDoc,
    #[serde(default)]
    stage: Vec<StepDoc>,
    sink: StepDoc,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepDoc {
    name: String,
    #[serde(rename = "type")]
    step_type: String,
    #[serde(default)]
    args: String,
    output_dir: Option<PathBuf>,
    compression: Option<String>,
    storage_time: Option<i32>,
}

/// Read the manifest. Relative entries are resolved against the manifest's directory.
pub fn read_manifest(path: &Path) -> Result<Vec<PathBuf>> {
    let manifest_err = |message: String| TroilkattError::Manifest {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(path).map_err(|e| manifest_err(e.to_string()))?;
    let base = path.parent().unwrap_or(Path::new(""));
    let mut docs = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let doc = PathBuf::from(line);
        if doc.extension().and_then(|e| e.to_str()) != Some(PIPELINE_DOC_EXTENSION) {
            return Err(manifest_err(format!(
                "line {}: not a .{} pipeline document: {}",
                n + 1,
                PIPELINE_DOC_EXTENSION,
                line
            )));
        }
        docs.push(if doc.is_absolute() { doc } else { base.join(doc) });
    }
    debug!("Manifest {} lists {} pipelines", path.display(), docs.len());
    Ok(docs)
}

/// Pipeline name: the document's file stem.
pub fn pipeline_name(doc_path: &Path) -> Result<String> {
    doc_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TroilkattError::Manifest {
            path: doc_path.to_path_buf(),
            message: "cannot derive a pipeline name".to_string(),
        })
}

fn step_config(
    doc: &StepDoc,
    kind: StepKind,
    seq: usize,
    pipeline: &str,
    config: &TroilkattConfig,
) -> Result<StepConfig> {
    let id = format!("{seq:03}-{}", doc.name.trim());
    let meta_dir = config.step_meta_dir(pipeline, &id);
    let step = StepConfig::new(kind, seq, &doc.name, &doc.args, meta_dir)?;
    let Some(out) = &doc.output_dir else {
        return Ok(step);
    };
    let compression = doc
        .compression
        .as_deref()
        .unwrap_or(StepDefaults::COMPRESSION)
        .parse::<CompressionTag>()
        .map_err(|message| TroilkattError::StepInit {
            step: step.id.clone(),
            message,
        })?;
    let retention = doc.storage_time.unwrap_or(StepDefaults::STORAGE_TIME);
    step.with_output(config.resolve_output_dir(out), compression, retention)
}

/// Parse a pipeline document into step configs and build the steps. Creates nothing on disk.
pub fn parse_pipeline(
    name: &str,
    text: &str,
    config: &TroilkattConfig,
    registry: &StepRegistry,
) -> Result<Pipeline> {
    let doc: PipelineDoc = toml::from_str(text).map_err(|e| TroilkattError::StepInit {
        step: name.to_string(),
        message: e.to_string(),
    })?;

    let mut steps = Vec::with_capacity(doc.stage.len() + 2);
    let source = step_config(&doc.source, StepKind::Source, 0, name, config)?;
    steps.push(registry.build(&doc.source.step_type, source)?);
    for (i, stage) in doc.stage.iter().enumerate() {
        let stage_config = step_config(stage, StepKind::Middle, i + 1, name, config)?;
        steps.push(registry.build(&stage.step_type, stage_config)?);
    }
    let sink = step_config(&doc.sink, StepKind::Sink, doc.stage.len() + 1, name, config)?;
    steps.push(registry.build(&doc.sink.step_type, sink)?);

    Pipeline::from_steps(name, config.localfs_dir.join(name), steps)
}

/// Load one pipeline document and create its directories: the local scratch dir, the storage
/// `log/<name>` dir, and the output and meta dirs of steps that persist output. `meta/<name>` only
/// exists as the parent of those step meta dirs, so every dir under `meta/` belongs to a step.
pub fn open_pipeline(
    doc_path: &Path,
    config: &TroilkattConfig,
    storage: &dyn Storage,
    registry: &StepRegistry,
) -> Result<Pipeline> {
    let name = pipeline_name(doc_path)?;
    let text = fs::read_to_string(doc_path).map_err(|e| TroilkattError::Manifest {
        path: doc_path.to_path_buf(),
        message: e.to_string(),
    })?;
    let pipeline = parse_pipeline(&name, &text, config, registry)?;

    fs::create_dir_all(pipeline.scratch_dir()).map_err(|e| {
        TroilkattError::Layout(format!(
            "could not create {}: {e}",
            pipeline.scratch_dir().display()
        ))
    })?;
    let mut dirs = vec![config.tfs_log_dir().join(&name)];
    for step in pipeline.step_configs() {
        if let Some(out) = &step.output_dir {
            dirs.push(out.clone());
            dirs.push(step.meta_dir.clone());
        }
    }
    for dir in &dirs {
        storage.mkdir_all(dir)?;
    }

    info!(target: pipeline.log_target(), "Loaded pipeline with {} steps", pipeline.step_configs().count());
    Ok(pipeline)
}

/// Load every pipeline listed in the manifest, in manifest order. Pipeline names must be unique.
pub fn open_pipelines(
    manifest: &Path,
    config: &TroilkattConfig,
    storage: &dyn Storage,
    registry: &StepRegistry,
) -> Result<Vec<Pipeline>> {
    let mut names = HashSet::new();
    let mut pipelines = Vec::new();
    for doc in read_manifest(manifest)? {
        let name = pipeline_name(&doc)?;
        if !names.insert(name.clone()) {
            return Err(TroilkattError::Manifest {
                path: manifest.to_path_buf(),
                message: format!("duplicate pipeline name: {name}"),
            });
        }
        pipelines.push(open_pipeline(&doc, config, storage, registry)?);
    }
    Ok(pipelines)
}
