//! Storage on a local or mounted (NFS) filesystem. Paths are used as given.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::Storage;
use super::naming::{self, ArchiveFormat, CompressionTag};
use crate::error::{Result, TroilkattError};
use crate::{FileList, Timestamp};

#[derive(Clone, Debug, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

/// Create `path`'s parent directory if it has one.
fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => fs::create_dir_all(p),
        _ => Ok(()),
    }
}

/// Name of `file` inside an archive rooted at `base`: relative path, or the bare file name when outside `base`.
fn archive_entry_name<'a>(file: &'a Path, base: &Path) -> io::Result<&'a Path> {
    file.strip_prefix(base)
        .ok()
        .or_else(|| file.file_name().map(Path::new))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no file name: {}", file.display()),
            )
        })
}

fn write_tar_gz(target: &Path, base: &Path, files: &[PathBuf]) -> io::Result<()> {
    let out = File::create(target)?;
    let enc = GzEncoder::new(out, Compression::default());
    let mut tar = tar::Builder::new(enc);
    for f in files {
        tar.append_path_with_name(f, archive_entry_name(f, base)?)?;
    }
    tar.into_inner()?.finish()?;
    Ok(())
}

fn unpack_tar_gz(archive: &Path, local_dir: &Path) -> io::Result<FileList> {
    let mut tar = tar::Archive::new(GzDecoder::new(File::open(archive)?));
    let mut files = Vec::new();
    for entry in tar.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.into_owned();
        if entry.unpack_in(local_dir)? && entry.header().entry_type().is_file() {
            files.push(local_dir.join(rel));
        }
    }
    files.sort();
    Ok(files)
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<FileList> {
    let mut files = Vec::new();
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(rel);
        ensure_parent(&target)?;
        fs::copy(entry.path(), &target)?;
        files.push(target);
    }
    files.sort();
    Ok(files)
}

fn write_versioned(local: &Path, target: &Path, compression: CompressionTag) -> io::Result<()> {
    match compression {
        CompressionTag::None => fs::copy(local, target).map(|_| ()),
        CompressionTag::Gz => {
            let mut enc = GzEncoder::new(File::create(target)?, Compression::default());
            io::copy(&mut File::open(local)?, &mut enc)?;
            enc.finish().map(|_| ())
        }
        other => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("compression not supported by local storage: {other}"),
        )),
    }
}

impl Storage for LocalStorage {
    fn mkdir_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(TroilkattError::storage(dir))
    }

    fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(path.is_dir())
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(dir)
            .and_then(|rd| rd.map(|e| e.map(|e| e.path())).collect::<io::Result<Vec<_>>>())
            .map_err(TroilkattError::storage(dir))?;
        entries.sort();
        Ok(entries)
    }

    fn list_recursive(&self, dir: &Path) -> Result<FileList> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = entry.map_err(|e| TroilkattError::Storage {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let res = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        res.map_err(TroilkattError::storage(path))
    }

    fn put_archive(
        &self,
        dir: &Path,
        timestamp: Timestamp,
        base: &Path,
        files: &[PathBuf],
        format: ArchiveFormat,
    ) -> Result<PathBuf> {
        let target = dir.join(format.dir_name(timestamp));
        debug!("Archive {} files to {}", files.len(), target.display());
        fs::create_dir_all(dir).map_err(TroilkattError::storage(dir))?;
        match format {
            ArchiveFormat::TarGz => {
                // Written under a name that never parses as an archive, then renamed into place.
                let partial = dir.join(format!(".{}.partial", format.dir_name(timestamp)));
                write_tar_gz(&partial, base, files)
                    .and_then(|()| fs::rename(&partial, &target))
                    .map_err(TroilkattError::storage(&target))?;
            }
            ArchiveFormat::None => {
                for f in files {
                    let dst = archive_entry_name(f, base).map(|rel| target.join(rel));
                    dst.and_then(|dst| ensure_parent(&dst).and_then(|()| fs::copy(f, &dst)))
                        .map_err(TroilkattError::storage(f))?;
                }
                fs::create_dir_all(&target).map_err(TroilkattError::storage(&target))?;
            }
        }
        Ok(target)
    }

    fn get_archive(&self, archive: &Path, local_dir: &Path) -> Result<FileList> {
        fs::create_dir_all(local_dir).map_err(TroilkattError::storage(local_dir))?;
        let format = naming::dir_format(archive);
        let files = match format.as_deref() {
            Some("tar.gz") => unpack_tar_gz(archive, local_dir),
            Some("none") => copy_tree(archive, local_dir),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported archive format: {other:?}"),
            )),
        };
        files.map_err(TroilkattError::storage(archive))
    }

    fn get_status_file(&self, remote: &Path, local: &Path) -> Result<()> {
        ensure_parent(local).map_err(TroilkattError::storage(local))?;
        if remote.is_file() {
            debug!("Copy status file {} to {}", remote.display(), local.display());
            fs::copy(remote, local).map_err(TroilkattError::storage(remote))?;
        } else {
            debug!("No status file at {}; creating empty {}", remote.display(), local.display());
            File::create(local).map_err(TroilkattError::storage(local))?;
        }
        Ok(())
    }

    fn put_status_file(&self, local: &Path, remote: &Path) -> Result<()> {
        ensure_parent(remote).map_err(TroilkattError::storage(remote))?;
        fs::copy(local, remote).map_err(TroilkattError::storage(remote))?;
        Ok(())
    }

    fn put_file(
        &self,
        local: &Path,
        dir: &Path,
        timestamp: Timestamp,
        compression: CompressionTag,
    ) -> Result<PathBuf> {
        let basename = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TroilkattError::Storage {
                path: local.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "no file name"),
            })?;
        let target = dir.join(naming::encode(basename, timestamp, compression));
        fs::create_dir_all(dir).map_err(TroilkattError::storage(dir))?;
        write_versioned(local, &target, compression).map_err(TroilkattError::storage(&target))?;
        debug!("Stored {} as {}", local.display(), target.display());
        Ok(target)
    }
}
