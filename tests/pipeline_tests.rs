mod common;

use common::{Recorder, read_lines, recording_pipeline, step_config, test_config};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;
use troilkatt::pipeline::StepHandle;
use troilkatt::storage::{ArchiveFormat, CompressionTag};
use troilkatt::utils::{MILLIS_PER_DAY, TroilkattConfig};
use troilkatt::{
    FileList, LocalStorage, Pipeline, RunContext, Source, State, StatusLog, StepContext,
    StepKind, StepResult, Storage, Timestamp, TroilkattError,
};

const STAGES: [&str; 3] = ["firstStage", "secondStage", "thirdStage"];

fn open_status(config: &TroilkattConfig) -> StatusLog {
    StatusLog::open(&LocalStorage::new(), &config.localfs_dir, &config.tfs_status_file).unwrap()
}

// --- run ---

#[test]
fn test_run_brackets_every_step_in_order() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let rec = Recorder::default();
    let mut p = recording_pipeline(&config, "test", "theSource", &STAGES, "theSink", &rec);

    let sunk = p.run(&mut RunContext::new(&mut status, &storage), 10).unwrap();

    assert_eq!(
        rec.calls(),
        vec![
            "theSource.retrieve",
            "firstStage.process",
            "secondStage.process",
            "thirdStage.process",
            "theSink.consume",
        ]
    );
    assert_eq!(
        sunk,
        vec![
            PathBuf::from("/in/a.txt+firstStage+secondStage+thirdStage"),
            PathBuf::from("/in/b.txt+firstStage+secondStage+thirdStage"),
        ]
    );
    assert_eq!(
        read_lines(status.local_path()),
        vec![
            "10:000-theSource:start",
            "10:000-theSource:done",
            "10:001-firstStage:start",
            "10:001-firstStage:done",
            "10:002-secondStage:start",
            "10:002-secondStage:done",
            "10:003-thirdStage:start",
            "10:003-thirdStage:done",
            "10:004-theSink:start",
            "10:004-theSink:done",
        ]
    );
}

#[test]
fn test_run_failure_stops_pipeline_and_leaves_start_record() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let rec = Recorder::default();
    rec.fail("secondStage");
    let mut p = recording_pipeline(&config, "test", "theSource", &STAGES, "theSink", &rec);

    let err = p
        .run(&mut RunContext::new(&mut status, &storage), 10)
        .unwrap_err();

    assert!(err.is_step_failure());
    match err {
        TroilkattError::Step { step_id, cause } => {
            assert_eq!(step_id, "002-secondStage");
            assert_eq!(cause.message(), "secondStage failed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        rec.calls(),
        vec!["theSource.retrieve", "firstStage.process", "secondStage.process"]
    );
    assert_eq!(status.get_status("001-firstStage", 10), Some(State::Done));
    assert_eq!(status.get_status("002-secondStage", 10), Some(State::Start));
    assert_eq!(status.get_status("003-thirdStage", 10), None);
    assert_eq!(status.get_status("004-theSink", 10), None);
    assert!(rec.sunk().is_empty());
}

#[test]
fn test_run_stops_before_next_step_when_cancelled() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let rec = Recorder::default();
    let cancel = Arc::new(AtomicBool::new(false));
    rec.cancel_on("secondStage", Arc::clone(&cancel));
    let mut p = recording_pipeline(&config, "test", "theSource", &STAGES, "theSink", &rec);

    let err = p
        .run(&mut RunContext::new(&mut status, &storage).with_cancel(&cancel), 10)
        .unwrap_err();

    assert!(matches!(err, TroilkattError::Interrupted(ref step) if step == "003-thirdStage"), "{err}");
    assert!(!err.is_step_failure());
    assert_eq!(
        rec.calls(),
        vec!["theSource.retrieve", "firstStage.process", "secondStage.process"]
    );
    assert_eq!(status.get_status("002-secondStage", 10), Some(State::Done));
    assert_eq!(status.get_status("003-thirdStage", 10), None);
    assert!(rec.sunk().is_empty());
}

#[test]
fn test_status_write_failure_stops_run_before_source() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let local = status.local_path().to_path_buf();
    fs::remove_file(&local).unwrap();
    fs::create_dir(&local).unwrap();
    let rec = Recorder::default();
    let mut p = recording_pipeline(&config, "test", "theSource", &STAGES, "theSink", &rec);

    let err = p
        .run(&mut RunContext::new(&mut status, &storage), 10)
        .unwrap_err();

    assert!(matches!(err, TroilkattError::StatusLog { ref path, .. } if *path == local), "{err}");
    assert!(rec.calls().is_empty());
    assert_eq!(status.get_status("000-theSource", 10), None);
}

// --- recover ---

#[test]
fn test_recover_selects_branch_per_step() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::create_dir_all(&config.localfs_dir).unwrap();
    let fixture = [
        "3:Troilkatt:done",
        "4:Troilkatt:start",
        "4:000-theSource:start",
        "4:000-theSource:done",
        "4:001-firstStage:start",
        "4:001-firstStage:done",
        "4:002-secondStage:recover",
    ];
    fs::write(config.localfs_dir.join("status.txt"), fixture.join("\n") + "\n").unwrap();
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let rec = Recorder::default();
    let mut p = recording_pipeline(&config, "test", "theSource", &STAGES, "theSink", &rec);

    p.recover(&mut RunContext::new(&mut status, &storage), 4).unwrap();

    assert_eq!(
        rec.calls(),
        vec![
            "theSource.recover",
            "firstStage.recover",
            "secondStage.process",
            "thirdStage.process",
            "theSink.consume",
        ]
    );
    let lines = read_lines(status.local_path());
    assert_eq!(
        lines[fixture.len()..].to_vec(),
        vec![
            "4:000-theSource:start",
            "4:000-theSource:recover",
            "4:000-theSource:done",
            "4:001-firstStage:start",
            "4:001-firstStage:recover",
            "4:001-firstStage:done",
            "4:002-secondStage:start",
            "4:002-secondStage:done",
            "4:003-thirdStage:start",
            "4:003-thirdStage:done",
            "4:004-theSink:start",
            "4:004-theSink:done",
        ]
    );
    for id in ["000-theSource", "001-firstStage", "002-secondStage", "004-theSink"] {
        assert_eq!(status.get_status(id, 4), Some(State::Done), "{id}");
    }
}

#[test]
fn test_recover_after_crash_matches_clean_run() {
    let clean_tmp = TempDir::new().unwrap();
    let clean_config = test_config(clean_tmp.path());
    let storage = LocalStorage::new();
    let mut clean_status = open_status(&clean_config);
    let clean_rec = Recorder::default();
    let mut clean = recording_pipeline(&clean_config, "test", "theSource", &STAGES, "theSink", &clean_rec);
    let expected = clean
        .run(&mut RunContext::new(&mut clean_status, &storage), 7)
        .unwrap();

    for crash_at in STAGES.iter().chain(["theSink"].iter()) {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let mut status = open_status(&config);
        let rec = Recorder::default();
        let mut p = recording_pipeline(&config, "test", "theSource", &STAGES, "theSink", &rec);

        rec.fail(crash_at);
        assert!(p.run(&mut RunContext::new(&mut status, &storage), 7).is_err());
        rec.heal(crash_at);

        let recovered = p
            .recover(&mut RunContext::new(&mut status, &storage), 7)
            .unwrap();
        assert_eq!(recovered, expected, "crash at {crash_at}");
        assert_eq!(rec.sunk().last(), Some(&expected), "crash at {crash_at}");
        assert_eq!(status.get_status("004-theSink", 7), Some(State::Done));
    }
}

#[test]
fn test_recover_propagates_step_failure() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let rec = Recorder::default();
    let mut p = recording_pipeline(&config, "test", "theSource", &STAGES, "theSink", &rec);
    rec.fail("thirdStage");
    assert!(p.run(&mut RunContext::new(&mut status, &storage), 3).is_err());

    rec.clear();
    let err = p
        .recover(&mut RunContext::new(&mut status, &storage), 3)
        .unwrap_err();
    assert!(err.is_step_failure());
    assert_eq!(
        rec.calls(),
        vec![
            "theSource.recover",
            "firstStage.recover",
            "secondStage.recover",
            "thirdStage.process",
        ]
    );
    assert_eq!(status.get_status("003-thirdStage", 3), Some(State::Start));
}

/// Source that saves one local file to its output dir and relies on the default recovery.
struct SavingSource;

impl Source for SavingSource {
    fn retrieve(&mut self, ctx: &StepContext<'_>, t: Timestamp) -> StepResult<FileList> {
        let local = ctx.scratch_dir.join("listing.txt");
        fs::create_dir_all(ctx.scratch_dir).unwrap();
        fs::write(&local, format!("retrieved at {t}")).unwrap();
        ctx.save_outputs(&[local], t)
    }
}

#[test]
fn test_default_source_recovery_lists_output_dir() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let rec = Recorder::default();
    let out = config.tfs_data_dir().join("listing");

    let source: StepHandle<dyn Source> = StepHandle::new(
        step_config(&config, "saving", StepKind::Source, 0, "saver")
            .with_output(out.clone(), CompressionTag::Gz, -1)
            .unwrap(),
        Box::new(SavingSource) as Box<dyn Source>,
    );
    let sink = StepHandle::new(
        step_config(&config, "saving", StepKind::Sink, 1, "theSink"),
        Box::new(common::RecordingSink {
            name: "theSink".to_string(),
            rec: rec.clone(),
        }) as Box<dyn troilkatt::Sink>,
    );
    let mut p = Pipeline::new("saving", config.localfs_dir.join("saving"), source, vec![], sink).unwrap();

    rec.fail("theSink");
    assert!(p.run(&mut RunContext::new(&mut status, &storage), 1000).is_err());
    rec.heal("theSink");
    let recovered = p
        .recover(&mut RunContext::new(&mut status, &storage), 1000)
        .unwrap();

    assert_eq!(recovered, vec![out.join("listing.txt.1000.gz")]);
    assert_eq!(status.get_status("000-saver", 1000), Some(State::Done));
    let source_lines: Vec<String> = read_lines(status.local_path())
        .into_iter()
        .filter(|l| l.contains("000-saver"))
        .collect();
    assert_eq!(
        source_lines,
        vec![
            "1000:000-saver:start",
            "1000:000-saver:done",
            "1000:000-saver:start",
            "1000:000-saver:recover",
            "1000:000-saver:done",
        ]
    );
}

// --- construction ---

#[test]
fn test_pipeline_rejects_duplicate_and_misplaced_steps() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let rec = Recorder::default();
    let make_source = |kind| {
        StepHandle::new(
            step_config(&config, "p", kind, 0, "src"),
            Box::new(common::RecordingSource {
                name: "src".to_string(),
                rec: rec.clone(),
            }) as Box<dyn Source>,
        )
    };
    let make_sink = |seq| {
        StepHandle::new(
            step_config(&config, "p", StepKind::Sink, seq, "src"),
            Box::new(common::RecordingSink {
                name: "src".to_string(),
                rec: rec.clone(),
            }) as Box<dyn troilkatt::Sink>,
        )
    };

    let dup = Pipeline::new("p", tmp.path().into(), make_source(StepKind::Source), vec![], make_sink(0));
    assert!(matches!(dup, Err(TroilkattError::StepInit { .. })));

    let wrong_kind = Pipeline::new("p", tmp.path().into(), make_source(StepKind::Middle), vec![], make_sink(1));
    assert!(matches!(wrong_kind, Err(TroilkattError::StepInit { .. })));

    assert!(Pipeline::new("p", tmp.path().into(), make_source(StepKind::Source), vec![], make_sink(1)).is_ok());
}

// --- cleanup ---

fn cleanup_pipeline(config: &TroilkattConfig, retention: i32, rec: &Recorder) -> (Pipeline, PathBuf) {
    let out = config.tfs_data_dir().join("test/crawler-output");
    let source = StepHandle::new(
        step_config(config, "test", StepKind::Source, 0, "theSource")
            .with_output(out.clone(), CompressionTag::Gz, retention)
            .unwrap(),
        Box::new(common::RecordingSource {
            name: "theSource".to_string(),
            rec: rec.clone(),
        }) as Box<dyn Source>,
    );
    let stage = StepHandle::new(
        step_config(config, "test", StepKind::Middle, 1, "noOutput"),
        Box::new(common::RecordingStage {
            name: "noOutput".to_string(),
            rec: rec.clone(),
        }) as Box<dyn troilkatt::Stage>,
    );
    let sink = StepHandle::new(
        step_config(config, "test", StepKind::Sink, 2, "theSink"),
        Box::new(common::RecordingSink {
            name: "theSink".to_string(),
            rec: rec.clone(),
        }) as Box<dyn troilkatt::Sink>,
    );
    let p = Pipeline::new("test", config.localfs_dir.join("test"), source, vec![stage], sink).unwrap();
    (p, out)
}

fn write_versions(dir: &std::path::Path, timestamps: &[i64]) {
    fs::create_dir_all(dir).unwrap();
    for ts in timestamps {
        fs::write(dir.join(format!("GSE1.soft.{ts}.gz")), "x").unwrap();
    }
}

#[test]
fn test_cleanup_keep_forever_deletes_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let rec = Recorder::default();
    let (p, out) = cleanup_pipeline(&config, -1, &rec);
    write_versions(&out, &[0, MILLIS_PER_DAY, 30 * MILLIS_PER_DAY]);

    for t in [0, 31 * MILLIS_PER_DAY, i64::MAX / 2] {
        let touched = p.cleanup(&RunContext::new(&mut status, &storage), t);
        assert_eq!(
            touched,
            vec![out.clone(), config.step_meta_dir("test", "000-theSource")]
        );
        assert_eq!(storage.list_recursive(&out).unwrap().len(), 3);
    }
    assert!(rec.calls().is_empty());
}

#[test]
fn test_cleanup_purges_expired_versions_only() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = LocalStorage::new();
    let mut status = open_status(&config);
    let rec = Recorder::default();
    let (p, out) = cleanup_pipeline(&config, 2, &rec);
    let now = 10 * MILLIS_PER_DAY;
    write_versions(&out, &[0, 8 * MILLIS_PER_DAY, now]);

    let touched = p.cleanup(&RunContext::new(&mut status, &storage), now);

    assert_eq!(touched.len(), 2);
    let left: Vec<String> = storage
        .list_recursive(&out)
        .unwrap()
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        left,
        vec![
            format!("GSE1.soft.{}.gz", 8 * MILLIS_PER_DAY),
            format!("GSE1.soft.{now}.gz"),
        ]
    );
}

/// Local storage whose file retention sweep always fails.
struct BrokenSweep(LocalStorage);

impl Storage for BrokenSweep {
    fn mkdir_all(&self, dir: &Path) -> troilkatt::Result<()> {
        self.0.mkdir_all(dir)
    }

    fn is_dir(&self, path: &Path) -> troilkatt::Result<bool> {
        self.0.is_dir(path)
    }

    fn list_dir(&self, dir: &Path) -> troilkatt::Result<Vec<PathBuf>> {
        self.0.list_dir(dir)
    }

    fn list_recursive(&self, dir: &Path) -> troilkatt::Result<FileList> {
        self.0.list_recursive(dir)
    }

    fn delete(&self, path: &Path) -> troilkatt::Result<()> {
        self.0.delete(path)
    }

    fn put_archive(
        &self,
        dir: &Path,
        timestamp: Timestamp,
        base: &Path,
        files: &[PathBuf],
        format: ArchiveFormat,
    ) -> troilkatt::Result<PathBuf> {
        self.0.put_archive(dir, timestamp, base, files, format)
    }

    fn get_archive(&self, archive: &Path, local_dir: &Path) -> troilkatt::Result<FileList> {
        self.0.get_archive(archive, local_dir)
    }

    fn get_status_file(&self, remote: &Path, local: &Path) -> troilkatt::Result<()> {
        self.0.get_status_file(remote, local)
    }

    fn put_status_file(&self, local: &Path, remote: &Path) -> troilkatt::Result<()> {
        self.0.put_status_file(local, remote)
    }

    fn put_file(
        &self,
        local: &Path,
        dir: &Path,
        timestamp: Timestamp,
        compression: CompressionTag,
    ) -> troilkatt::Result<PathBuf> {
        self.0.put_file(local, dir, timestamp, compression)
    }

    fn cleanup_older_than(&self, dir: &Path, _t: Timestamp, _days: i32) -> troilkatt::Result<usize> {
        Err(TroilkattError::Storage {
            path: dir.to_path_buf(),
            source: std::io::Error::other("sweep failed"),
        })
    }
}

#[test]
fn test_cleanup_leaves_out_dir_that_failed_to_purge() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let storage = BrokenSweep(LocalStorage::new());
    let mut status = open_status(&config);
    let rec = Recorder::default();
    let (p, out) = cleanup_pipeline(&config, 2, &rec);
    let now = 10 * MILLIS_PER_DAY;
    write_versions(&out, &[0, now]);

    let touched = p.cleanup(&RunContext::new(&mut status, &storage), now);

    assert_eq!(touched, vec![config.step_meta_dir("test", "000-theSource")]);
    assert_eq!(storage.list_recursive(&out).unwrap().len(), 2);
}
