//! Log file housekeeping for the console binary.
//!
//! The subscriber itself is installed by the binary; this module only makes
//! sure the file has somewhere to go and does not grow without bound.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Size at which `cdp-debug.log` is rotated (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated generations kept next to the live log.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// Create the directory `log_path` lives in.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    match log_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// Move the live log to `<name>.1` once it reaches `max_size` bytes.
///
/// Older generations shift up by one and anything past `keep` is deleted,
/// so `.1` is always the most recent.
pub fn rotate_log_files(log_path: &Path, max_size: u64, keep: u32) -> io::Result<()> {
    match fs::metadata(log_path) {
        Ok(meta) if meta.len() >= max_size => {}
        Ok(_) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    }

    for generation in (1..=keep).rev() {
        let from = generation_path(log_path, generation);
        if !from.exists() {
            continue;
        }
        if generation == keep {
            fs::remove_file(&from)?;
        } else {
            fs::rename(&from, generation_path(log_path, generation + 1))?;
        }
    }
    fs::rename(log_path, generation_path(log_path, 1))
}

fn generation_path(log_path: &Path, generation: u32) -> PathBuf {
    let mut name = log_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{generation}"));
    log_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_path_appends_index() {
        let base = Path::new("/tmp/cdp-debug.log");
        assert_eq!(
            generation_path(base, 1),
            PathBuf::from("/tmp/cdp-debug.log.1")
        );
        assert_eq!(
            generation_path(base, 3),
            PathBuf::from("/tmp/cdp-debug.log.3")
        );
    }

    #[test]
    fn rotate_no_op_when_file_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("cdp-debug.log");
        assert!(rotate_log_files(&log, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES).is_ok());
    }

    #[test]
    fn rotate_no_op_when_file_under_max_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("cdp-debug.log");
        fs::write(&log, "small content").unwrap();
        rotate_log_files(&log, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES).unwrap();
        assert!(log.exists());
    }

    #[test]
    fn rotate_cascades_existing_rotated_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("cdp-debug.log");

        fs::write(dir.path().join("cdp-debug.log.1"), "old1").unwrap();
        fs::write(dir.path().join("cdp-debug.log.2"), "old2").unwrap();
        fs::write(&log, "x".repeat(200)).unwrap();

        rotate_log_files(&log, 50, 3).unwrap();

        assert!(!log.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("cdp-debug.log.2")).unwrap(),
            "old1"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("cdp-debug.log.3")).unwrap(),
            "old2"
        );
    }

    #[test]
    fn rotate_deletes_oldest_beyond_max_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("cdp-debug.log");

        fs::write(dir.path().join("cdp-debug.log.1"), "old1").unwrap();
        fs::write(dir.path().join("cdp-debug.log.2"), "old2").unwrap();
        fs::write(&log, "x".repeat(200)).unwrap();

        rotate_log_files(&log, 50, 2).unwrap();

        assert!(dir.path().join("cdp-debug.log.1").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("cdp-debug.log.2")).unwrap(),
            "old1"
        );
    }

    #[test]
    fn ensure_log_dir_creates_nested_parents() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("a").join("b").join("cdp-debug.log");
        ensure_log_dir(&log).unwrap();
        ensure_log_dir(&log).unwrap();
        assert!(dir.path().join("a").join("b").exists());
    }
}
