use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("{path} is locked by another program")]
    Locked { path: PathBuf },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes `{dir}/{filename}` through a temp file in the same directory, so a
/// reader never sees a half-written spreadsheet.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        if target.exists() {
            fs::remove_file(&target).map_err(|e| classify(e, &target))?;
        }
        tmp.persist(&target).map_err(|e| classify(e.error, &target))?;
        Ok(target)
    }
}

/// Spreadsheet programs hold an exclusive lock on open files; on Windows that
/// surfaces as a sharing (32) or lock (33) violation.
fn classify(err: io::Error, path: &Path) -> PersistError {
    let sharing_violation = cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33));
    let locked = err.kind() == io::ErrorKind::PermissionDenied || sharing_violation;
    if locked {
        PersistError::Locked {
            path: path.to_path_buf(),
        }
    } else {
        PersistError::Io(err)
    }
}
