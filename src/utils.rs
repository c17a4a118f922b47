use crate::errors::{Result, StackError};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Message editor invocation
pub mod editor;

/// Atomic file operations so a crash never leaves half-written stack state
pub mod atomic_file {
    use super::*;

    /// Write JSON data to a file atomically (temp file + rename) under a lock
    pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(data)?;
        write_string(path, &content)
    }

    /// Write string content to a file atomically under a lock
    pub fn write_string(path: &Path, content: &str) -> Result<()> {
        crate::utils::file_locking::with_file_lock(path, || write_string_unlocked(path, content))
    }

    /// Append one line to a file under a lock, creating it if needed
    pub fn append_line(path: &Path, line: &str) -> Result<()> {
        use std::io::Write;

        crate::utils::file_locking::with_file_lock(path, || {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| StackError::config(format!("Failed to open {path:?}: {e}")))?;
            writeln!(file, "{line}")?;
            file.sync_data()?;
            Ok(())
        })
    }

    fn write_string_unlocked(path: &Path, content: &str) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, content)
            .map_err(|e| StackError::config(format!("Failed to write temporary file: {e}")))?;

        atomic_rename(&temp_path, path)
    }

    #[cfg(windows)]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        // Windows can briefly hold the target open; retry a few times
        const MAX_RETRIES: u32 = 3;
        const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

        let mut attempt = 1;
        loop {
            match fs::rename(temp_path, final_path) {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= MAX_RETRIES => {
                    let _ = fs::remove_file(temp_path);
                    return Err(StackError::config(format!(
                        "Failed to finalize file write after {MAX_RETRIES} attempts: {e}"
                    )));
                }
                Err(_) => {
                    attempt += 1;
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }
    }

    #[cfg(not(windows))]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        fs::rename(temp_path, final_path)
            .map_err(|e| StackError::config(format!("Failed to finalize file write: {e}")))
    }
}

/// Lock files guarding persisted stack state
pub mod file_locking {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    /// Exclusive lock held as `<file>.lock` for as long as the value lives
    pub struct FileLock {
        _file: File,
        lock_path: PathBuf,
    }

    impl FileLock {
        const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
        const RETRY_INTERVAL: Duration = Duration::from_millis(50);

        /// Attempt to acquire a lock on a file with timeout
        pub fn acquire_with_timeout(file_path: &Path, timeout: Duration) -> Result<Self> {
            let lock_path = file_path.with_extension("lock");
            let start_time = Instant::now();

            loop {
                match Self::try_acquire(&lock_path) {
                    Ok(lock) => return Ok(lock),
                    Err(e) => {
                        if start_time.elapsed() >= timeout {
                            return Err(StackError::config(format!(
                                "Timeout waiting for lock on {file_path:?} after {}ms: {e}",
                                timeout.as_millis()
                            )));
                        }
                        std::thread::sleep(Self::RETRY_INTERVAL);
                    }
                }
            }
        }

        /// Try to acquire a lock immediately
        pub fn try_acquire(lock_path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(lock_path)
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::AlreadyExists => StackError::config(format!(
                        "Lock file {lock_path:?} already exists; another pst process may be running"
                    )),
                    _ => StackError::config(format!("Failed to acquire lock {lock_path:?}: {e}")),
                })?;

            Ok(Self {
                _file: file,
                lock_path: lock_path.to_path_buf(),
            })
        }

        pub fn acquire(file_path: &Path) -> Result<Self> {
            Self::acquire_with_timeout(file_path, Self::DEFAULT_TIMEOUT)
        }
    }

    impl Drop for FileLock {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }

    /// Execute an operation with file locking protection
    pub fn with_file_lock<F, R>(file_path: &Path, operation: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        let _lock = FileLock::acquire(file_path)?;
        operation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_write_json_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stack.json");

        atomic_file::write_json(&path, &vec!["p1", "p2"]).unwrap();
        atomic_file::write_json(&path, &vec!["q1"]).unwrap();

        let back: Vec<String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec!["q1"]);
        assert!(!path.with_extension("tmp").exists());
        assert!(!path.with_extension("lock").exists());
    }

    #[test]
    fn test_append_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.jsonl");

        atomic_file::append_line(&path, "{\"id\":1}").unwrap();
        atomic_file::append_line(&path, "{\"id\":2}").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"id\":1}\n{\"id\":2}\n");
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stack.json");

        let lock = file_locking::FileLock::acquire(&path).unwrap();
        let second = file_locking::FileLock::acquire_with_timeout(&path, Duration::from_millis(100));
        assert!(second.is_err());

        drop(lock);
        assert!(file_locking::FileLock::acquire(&path).is_ok());
    }
}
