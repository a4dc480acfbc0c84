// Existence checks, removal, byte-for-byte copy, and file metadata queries.
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::error::{Error, ErrorKind, io_error_kind};
use crate::core::handle::{Handle, Mode};

const COPY_CHUNK: usize = 64 * 1024;

pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

pub fn remove(path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    fs::remove_file(path).map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_path(path)
            .with_source(err)
    })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CopyOptions {
    pub overwrite: bool,
    pub verify: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CopyReport {
    pub bytes_copied: u64,
    pub digest: Option<String>,
}

/// Copies `src` to `dest` byte for byte through binary handles.
///
/// With `verify` the destination is re-read and its SHA-256 digest compared
/// against the source digest before the report is returned.
pub fn copy(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: CopyOptions,
) -> Result<CopyReport, Error> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    let mut reader = Handle::open(src, Mode::Read)?;
    let dest_mode = if options.overwrite {
        Mode::Write
    } else {
        Mode::CreateNew
    };
    let mut writer = Handle::open(dest, dest_mode)?;

    let mut hasher = options.verify.then(Sha256::new);
    let mut bytes_copied = 0u64;
    loop {
        let chunk = reader.read_bytes(COPY_CHUNK)?;
        if chunk.is_empty() {
            break;
        }
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }
        writer.write_bytes(&chunk)?;
        bytes_copied += chunk.len() as u64;
    }
    writer.sync()?;
    drop(writer);

    let digest = match hasher {
        Some(hasher) => {
            let expected = hex_digest(hasher);
            let actual = file_digest(dest)?;
            if actual != expected {
                return Err(Error::new(ErrorKind::Io)
                    .with_message("copy verification failed: digest mismatch")
                    .with_path(dest));
            }
            tracing::debug!(bytes = bytes_copied, digest = %actual, "copy verified");
            Some(actual)
        }
        None => None,
    };

    Ok(CopyReport {
        bytes_copied,
        digest,
    })
}

fn file_digest(path: &Path) -> Result<String, Error> {
    let mut handle = Handle::open(path, Mode::Read)?;
    let mut hasher = Sha256::new();
    loop {
        let chunk = handle.read_bytes(COPY_CHUNK)?;
        if chunk.is_empty() {
            break;
        }
        hasher.update(&chunk);
    }
    Ok(hex_digest(hasher))
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub len: u64,
    pub modified: String,
}

pub fn stat(path: impl AsRef<Path>) -> Result<FileInfo, Error> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_path(path)
            .with_source(err)
    })?;
    let modified = meta.modified().map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_path(path)
            .with_source(err)
    })?;
    let modified = OffsetDateTime::from(modified)
        .format(&Rfc3339)
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to format modification time")
                .with_path(path)
                .with_source(err)
        })?;
    Ok(FileInfo {
        path: path.to_path_buf(),
        len: meta.len(),
        modified,
    })
}

#[cfg(test)]
mod tests {
    use super::{CopyOptions, copy, exists, remove, stat};
    use crate::core::error::ErrorKind;

    #[test]
    fn exists_then_remove_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("probe.txt");
        assert!(!exists(&path));

        std::fs::write(&path, "here").expect("seed");
        assert!(exists(&path));

        remove(&path).expect("remove");
        assert!(!exists(&path));
    }

    #[test]
    fn remove_missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = remove(dir.path().join("gone.txt")).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn copy_preserves_binary_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("pic.bin");
        let dest = dir.path().join("copy.bin");
        let payload: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        std::fs::write(&src, &payload).expect("seed");

        let report = copy(&src, &dest, CopyOptions::default()).expect("copy");
        assert_eq!(report.bytes_copied, payload.len() as u64);
        assert_eq!(report.digest, None);
        assert_eq!(std::fs::read(&dest).expect("read back"), payload);
    }

    #[test]
    fn copy_with_verify_reports_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        std::fs::write(&src, b"papyra").expect("seed");

        let options = CopyOptions {
            overwrite: false,
            verify: true,
        };
        let report = copy(&src, &dest, options).expect("copy");
        assert_eq!(report.bytes_copied, 6);
        let digest = report.digest.expect("digest");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn copy_refuses_existing_destination_without_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("dest.txt");
        std::fs::write(&src, "new").expect("seed src");
        std::fs::write(&dest, "old").expect("seed dest");

        let err = copy(&src, &dest, CopyOptions::default()).expect_err("collision");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "old");

        let options = CopyOptions {
            overwrite: true,
            verify: false,
        };
        copy(&src, &dest, options).expect("overwrite");
        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "new");
    }

    #[test]
    fn stat_reports_length_and_rfc3339_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("info.txt");
        std::fs::write(&path, "12345").expect("seed");

        let info = stat(&path).expect("stat");
        assert_eq!(info.len, 5);
        assert!(info.modified.contains('T'));
        assert!(info.modified.ends_with('Z') || info.modified.contains('+'));
    }
}
