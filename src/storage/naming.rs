//! Versioned file and archive names: `basename.timestamp.compression` and `timestamp.format`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::Timestamp;

/// Compression tag at the end of a versioned filename.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompressionTag {
    #[default]
    None,
    Gz,
    Bz2,
    Zip,
}

impl CompressionTag {
    pub const ALL: [CompressionTag; 4] = [
        CompressionTag::None,
        CompressionTag::Gz,
        CompressionTag::Bz2,
        CompressionTag::Zip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionTag::None => "none",
            CompressionTag::Gz => "gz",
            CompressionTag::Bz2 => "bz2",
            CompressionTag::Zip => "zip",
        }
    }
}

impl fmt::Display for CompressionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompressionTag::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("invalid compression format: {s}"))
    }
}

/// Format of a timestamped directory archive, e.g. `1294671060000.tar.gz`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Plain directory named `<timestamp>.none`.
    None,
    #[default]
    TarGz,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::None => "none",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// Archive name for `timestamp`.
    pub fn dir_name(&self, timestamp: Timestamp) -> String {
        format!("{}.{}", timestamp, self.as_str())
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded `basename.timestamp.compression` triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionedName {
    pub basename: String,
    pub timestamp: Timestamp,
    pub compression: CompressionTag,
}

impl VersionedName {
    pub fn new(basename: impl Into<String>, timestamp: Timestamp, compression: CompressionTag) -> Self {
        Self {
            basename: basename.into(),
            timestamp,
            compression,
        }
    }

    pub fn encode(&self) -> String {
        encode(&self.basename, self.timestamp, self.compression)
    }

    /// Parse a bare filename. Returns `None` unless it has a non-empty basename,
    /// a non-negative numeric timestamp and a known compression tag.
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.rsplitn(3, '.');
        let compression = parts.next()?.parse().ok()?;
        let timestamp: Timestamp = parts.next()?.parse().ok()?;
        let basename = parts.next()?;
        if basename.is_empty() || timestamp < 0 {
            return None;
        }
        Some(Self::new(basename, timestamp, compression))
    }

    /// Parse the file name component of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name().and_then(|n| n.to_str()).and_then(Self::parse)
    }
}

impl fmt::Display for VersionedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.basename, self.timestamp, self.compression)
    }
}

pub fn encode(basename: &str, timestamp: Timestamp, compression: CompressionTag) -> String {
    format!("{basename}.{timestamp}.{compression}")
}

/// Timestamp of an archive named `<ts>.<fmt>` or `<ts>.tar.<fmt>`.
pub fn dir_timestamp(path: &Path) -> Option<Timestamp> {
    let name = path.file_name()?.to_str()?;
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() < 2 {
        return None;
    }
    let mut ts = parts[parts.len() - 2];
    if ts == "tar" {
        if parts.len() < 3 {
            return None;
        }
        ts = parts[parts.len() - 3];
    }
    ts.parse().ok().filter(|t: &Timestamp| *t >= 0)
}

/// Format suffix of an archive (`none`, `tar.gz`, `gz`, ...). `None` if the name has no suffix.
pub fn dir_format(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let parts: Vec<&str> = name.split('.').collect();
    match parts.len() {
        0 | 1 => None,
        n if parts[n - 2] == "tar" => Some(format!("tar.{}", parts[n - 1])),
        n => Some(parts[n - 1].to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_keeps_dots_in_basename() {
        let v = VersionedName::parse("GSE1000.soft.1294671060000.gz").unwrap();
        assert_eq!(v.basename, "GSE1000.soft");
        assert_eq!(v.timestamp, 1294671060000);
        assert_eq!(v.compression, CompressionTag::Gz);
    }

    #[test]
    fn test_dir_timestamp_tar_suffix() {
        assert_eq!(dir_timestamp(&PathBuf::from("/m/12.tar.gz")), Some(12));
        assert_eq!(dir_timestamp(&PathBuf::from("/m/12.none")), Some(12));
        assert_eq!(dir_timestamp(&PathBuf::from("/m/tar.gz")), None);
        assert_eq!(dir_format(&PathBuf::from("/m/12.tar.gz")).as_deref(), Some("tar.gz"));
    }
}
