// src/source/archive.rs

//! Source archive extraction

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// Compression wrapped around a tarball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    Tar,
}

impl ArchiveFormat {
    /// Detect from a file name such as `v0.52.0.tar.gz`
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    /// Detect from leading magic bytes; anything else is taken as plain tar
    pub fn sniff(path: &Path) -> Result<Self> {
        let mut header = [0u8; 6];
        let mut file = File::open(path)?;
        let read = file.read(&mut header)?;
        let header = &header[..read];

        Ok(if header.starts_with(GZIP_MAGIC) {
            Self::TarGz
        } else if header.starts_with(XZ_MAGIC) {
            Self::TarXz
        } else {
            Self::Tar
        })
    }
}

fn open_archive(path: &Path, format: ArchiveFormat) -> Result<Archive<Box<dyn Read>>> {
    let file = File::open(path)?;

    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveFormat::TarXz => Box::new(XzDecoder::new(file)),
        ArchiveFormat::Tar => Box::new(file),
    };

    Ok(Archive::new(reader))
}

/// Extract `archive` into `dest` and return the source root
///
/// `name_hint` is the original file name; when it has no known suffix the
/// format is sniffed from the content. If the archive holds a single
/// top-level directory, that directory is the source root.
pub fn unpack(archive: &Path, name_hint: Option<&str>, dest: &Path) -> Result<PathBuf> {
    let format = match name_hint.and_then(ArchiveFormat::from_file_name) {
        Some(format) => format,
        None => ArchiveFormat::sniff(archive)?,
    };
    debug!(?format, archive = %archive.display(), "Extracting source");

    fs::create_dir_all(dest)?;
    let mut tar = open_archive(archive, format)?;
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|e| {
        Error::FetchFailed(format!("Failed to extract {}: {}", archive.display(), e))
    })?;

    let entries: Vec<_> = fs::read_dir(dest)?.filter_map(|e| e.ok()).collect();
    if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
        let root = entries[0].path();
        debug!("Source directory: {}", root.display());
        return Ok(root);
    }

    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write a tarball of `files` (path, content) through `wrap`
    fn build_tar<W: Write>(out: W, files: &[(&str, &str)]) -> W {
        let mut builder = tar::Builder::new(out);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn tar_gz(path: &Path, files: &[(&str, &str)]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        build_tar(encoder, files).finish().unwrap();
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(ArchiveFormat::from_file_name("v0.52.0.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("synth.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("synth.tar.xz"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_file_name("synth.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_file_name("synth.zip"), None);
    }

    #[test]
    fn test_unpack_single_top_level_dir() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("v0.52.0.tar.gz");
        tar_gz(
            &archive,
            &[("synth-0.52.0/SConstruct", "env = Environment()\n"), ("synth-0.52.0/src/main.cpp", "")],
        );

        let dest = dir.path().join("build");
        let root = unpack(&archive, Some("v0.52.0.tar.gz"), &dest).unwrap();
        assert_eq!(root, dest.join("synth-0.52.0"));
        assert!(root.join("SConstruct").is_file());
        assert!(root.join("src/main.cpp").is_file());
    }

    #[test]
    fn test_unpack_flat_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("flat.tar.gz");
        tar_gz(&archive, &[("SConstruct", ""), ("README", "")]);

        let dest = dir.path().join("build");
        let root = unpack(&archive, None, &dest).unwrap();
        assert_eq!(root, dest);
    }

    #[test]
    fn test_sniff_without_name() {
        let dir = TempDir::new().unwrap();

        let gz = dir.path().join("sha256_gz");
        tar_gz(&gz, &[("a/b", "x")]);
        assert_eq!(ArchiveFormat::sniff(&gz).unwrap(), ArchiveFormat::TarGz);

        let xz = dir.path().join("sha256_xz");
        let encoder = xz2::write::XzEncoder::new(File::create(&xz).unwrap(), 6);
        build_tar(encoder, &[("pkg/file", "data")]).finish().unwrap();
        assert_eq!(ArchiveFormat::sniff(&xz).unwrap(), ArchiveFormat::TarXz);

        let root = unpack(&xz, None, &dir.path().join("out")).unwrap();
        assert_eq!(fs::read_to_string(root.join("file")).unwrap(), "data");

        let plain = dir.path().join("sha256_tar");
        build_tar(File::create(&plain).unwrap(), &[("f", "")]);
        assert_eq!(ArchiveFormat::sniff(&plain).unwrap(), ArchiveFormat::Tar);
    }

    #[test]
    fn test_unpack_garbage_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bad.tar.gz");
        fs::write(&archive, b"not an archive").unwrap();

        let err = unpack(&archive, Some("bad.tar.gz"), &dir.path().join("out")).unwrap_err();
        assert_eq!(err.kind(), "FetchFailed");
    }
}
