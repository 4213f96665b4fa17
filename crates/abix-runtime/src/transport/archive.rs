//! Archive extraction (gzip-tar, plain tar, zip) and tar creation.
//!
//! Unix permission bits survive both directions so extracted executables stay
//! runnable.

use abix_core::{AbixError, IoResultExt, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// Extract `archive` into `dest`, creating `dest` if needed.
pub fn extract(archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<()> {
    fs::create_dir_all(dest).io_context(|| format!("failed to create {}", dest.display()))?;
    let file = File::open(archive).io_context(|| format!("failed to open {}", archive.display()))?;
    let reader = BufReader::new(file);
    match format {
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(reader), dest),
        ArchiveFormat::Tar => unpack_tar(reader, dest),
        ArchiveFormat::Zip => unpack_zip(reader, dest),
    }
    .map_err(|e| AbixError::extraction(archive, e))
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> io::Result<()> {
    let mut ar = tar::Archive::new(reader);
    ar.set_preserve_permissions(true);
    ar.set_overwrite(true);
    ar.unpack(dest)
}

fn unpack_zip<R: Read + io::Seek>(reader: R, dest: &Path) -> io::Result<()> {
    let mut ar = zip::ZipArchive::new(reader).map_err(zip_io)?;
    for i in 0..ar.len() {
        let mut entry = ar.by_index(i).map_err(zip_io)?;
        // Skip entries escaping `dest` (absolute or `..`).
        let rel = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => continue,
        };
        let out_path = dest.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
    }
    Ok(())
}

fn zip_io(e: zip::result::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Write an uncompressed tar at `archive` holding each of `dirs` (relative
/// to `base`). Symlinks are stored as links. The archive appears under its
/// final name only once complete.
pub fn create_tar(archive: &Path, base: &Path, dirs: &[&str]) -> Result<()> {
    let parent = archive
        .parent()
        .ok_or_else(|| AbixError::extraction(archive, "archive path has no parent directory"))?;
    fs::create_dir_all(parent).io_context(|| format!("failed to create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .io_context(|| format!("failed to stage {}", archive.display()))?;
    {
        let mut builder = tar::Builder::new(tmp.as_file_mut());
        builder.follow_symlinks(false);
        for dir in dirs {
            builder
                .append_dir_all(dir, base.join(dir))
                .map_err(|e| AbixError::extraction(archive, format!("{}: {}", dir, e)))?;
        }
        builder
            .finish()
            .map_err(|e| AbixError::extraction(archive, e))?;
    }
    tmp.as_file()
        .sync_all()
        .io_context(|| format!("failed to flush {}", archive.display()))?;
    tmp.persist(archive)
        .map_err(|e| AbixError::io(format!("failed to write {}", archive.display()), e.error))?;
    Ok(())
}
