//! Shared fixtures: a scratch config and recording step doubles.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use troilkatt::pipeline::StepHandle;
use troilkatt::utils::TroilkattConfig;
use troilkatt::{
    FileList, Pipeline, RunMode, Sink, Source, Stage, StepConfig, StepContext, StepError,
    StepKind, StepResult, Timestamp,
};

/// Config with every directory under `root`.
pub fn test_config(root: &Path) -> TroilkattConfig {
    TroilkattConfig {
        persistent_storage: "local".to_string(),
        localfs_dir: root.join("local"),
        localfs_log_dir: root.join("local/log"),
        global_meta_dir: root.join("local/global-meta"),
        mapreduce_dir: root.join("local/mapreduce"),
        tfs_root_dir: root.join("tfs"),
        tfs_status_file: root.join("tfs/status.txt"),
        run_mode: RunMode::Once,
        crawl_interval_hours: 24.0,
        cleanup: true,
    }
}

pub fn step_config(
    config: &TroilkattConfig,
    pipeline: &str,
    kind: StepKind,
    seq: usize,
    name: &str,
) -> StepConfig {
    let id = format!("{seq:03}-{name}");
    StepConfig::new(kind, seq, name, "", config.step_meta_dir(pipeline, &id)).unwrap()
}

/// Records every step call, fails the steps named in `failing`, and sets a cancel flag when the
/// step named in `cancel_on` runs.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<String>>>,
    failing: Rc<RefCell<HashSet<String>>>,
    sunk: Rc<RefCell<Vec<FileList>>>,
    cancel_on: Rc<RefCell<Option<(String, Arc<AtomicBool>)>>>,
}

impl Recorder {
    fn call(&self, step: &str, op: &str) -> StepResult<()> {
        self.calls.borrow_mut().push(format!("{step}.{op}"));
        if let Some((name, flag)) = self.cancel_on.borrow().as_ref()
            && name == step
        {
            flag.store(true, Ordering::Relaxed);
        }
        if self.failing.borrow().contains(step) {
            return Err(StepError::new(format!("{step} failed")));
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn fail(&self, step: &str) {
        self.failing.borrow_mut().insert(step.to_string());
    }

    pub fn heal(&self, step: &str) {
        self.failing.borrow_mut().remove(step);
    }

    /// Set `flag` as soon as `step` is called, as a Ctrl+C during that step would.
    pub fn cancel_on(&self, step: &str, flag: Arc<AtomicBool>) {
        *self.cancel_on.borrow_mut() = Some((step.to_string(), flag));
    }

    /// File lists received by sinks, in call order.
    pub fn sunk(&self) -> Vec<FileList> {
        self.sunk.borrow().clone()
    }
}

pub struct RecordingSource {
    pub name: String,
    pub rec: Recorder,
}

impl Source for RecordingSource {
    fn retrieve(&mut self, _ctx: &StepContext<'_>, _t: Timestamp) -> StepResult<FileList> {
        self.rec.call(&self.name, "retrieve")?;
        Ok(vec![PathBuf::from("/in/a.txt"), PathBuf::from("/in/b.txt")])
    }

    fn recover_outputs(&mut self, _ctx: &StepContext<'_>, _t: Timestamp) -> StepResult<FileList> {
        self.rec.call(&self.name, "recover")?;
        Ok(vec![PathBuf::from("/in/a.txt"), PathBuf::from("/in/b.txt")])
    }
}

/// Appends `+<name>` to every path, so the sink input shows which stages ran.
pub struct RecordingStage {
    pub name: String,
    pub rec: Recorder,
}

impl RecordingStage {
    fn transform(&self, input: FileList) -> FileList {
        input
            .into_iter()
            .map(|f| PathBuf::from(format!("{}+{}", f.display(), self.name)))
            .collect()
    }
}

impl Stage for RecordingStage {
    fn process(&mut self, _ctx: &StepContext<'_>, input: FileList, _t: Timestamp) -> StepResult<FileList> {
        self.rec.call(&self.name, "process")?;
        Ok(self.transform(input))
    }

    fn recover_outputs(
        &mut self,
        _ctx: &StepContext<'_>,
        input: FileList,
        _t: Timestamp,
    ) -> StepResult<FileList> {
        self.rec.call(&self.name, "recover")?;
        Ok(self.transform(input))
    }
}

pub struct RecordingSink {
    pub name: String,
    pub rec: Recorder,
}

impl Sink for RecordingSink {
    fn consume(&mut self, _ctx: &StepContext<'_>, input: &[PathBuf], _t: Timestamp) -> StepResult<()> {
        self.rec.call(&self.name, "consume")?;
        self.rec.sunk.borrow_mut().push(input.to_vec());
        Ok(())
    }
}

/// `<source> -> stages... -> <sink>` built from recording doubles.
pub fn recording_pipeline(
    config: &TroilkattConfig,
    name: &str,
    source: &str,
    stages: &[&str],
    sink: &str,
    rec: &Recorder,
) -> Pipeline {
    let sink_seq = stages.len() + 1;
    let source: StepHandle<dyn Source> = StepHandle::new(
        step_config(config, name, StepKind::Source, 0, source),
        Box::new(RecordingSource {
            name: source.to_string(),
            rec: rec.clone(),
        }) as Box<dyn Source>,
    );
    let stages: Vec<StepHandle<dyn Stage>> = stages
        .iter()
        .enumerate()
        .map(|(i, s)| {
            StepHandle::new(
                step_config(config, name, StepKind::Middle, i + 1, s),
                Box::new(RecordingStage {
                    name: s.to_string(),
                    rec: rec.clone(),
                }) as Box<dyn Stage>,
            )
        })
        .collect();
    let sink: StepHandle<dyn Sink> = StepHandle::new(
        step_config(config, name, StepKind::Sink, sink_seq, sink),
        Box::new(RecordingSink {
            name: sink.to_string(),
            rec: rec.clone(),
        }) as Box<dyn Sink>,
    );
    Pipeline::new(name, config.localfs_dir.join(name), source, stages, sink).unwrap()
}

/// Lines of a text file.
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
