//! Advisory file locks and atomic file replacement
//!
//! Every persistent record has a sibling `.lock` file. Holding an exclusive
//! lock on it serialises the read-modify-write of that record across threads
//! and across independently scheduled agent processes.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::trace;

use super::error::{StateError, StateResult};

/// Exclusive lock on one record, released on drop
#[derive(Debug)]
pub struct RecordLock {
    file: File,
    path: PathBuf,
}

/// How long to wait for a peer holding a record lock
pub const LOCK_WAIT: Duration = Duration::from_secs(5);

const RETRY_DELAY: Duration = Duration::from_millis(10);

impl RecordLock {
    /// Take the exclusive lock for `record`, waiting at most [`LOCK_WAIT`].
    pub fn acquire(record: &Path) -> StateResult<Self> {
        Self::acquire_within(record, LOCK_WAIT)
    }

    /// Take the exclusive lock for `record`, giving up with
    /// [`StateError::LockFailed`] once `wait` has passed.
    pub fn acquire_within(record: &Path, wait: Duration) -> StateResult<Self> {
        let path = lock_path(record);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        let deadline = Instant::now() + wait;
        loop {
            match file.try_lock() {
                Ok(()) => break,
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    std::thread::sleep(RETRY_DELAY);
                }
                Err(TryLockError::WouldBlock) => {
                    return Err(StateError::LockFailed(format!(
                        "{}: still held after {}ms",
                        path.display(),
                        wait.as_millis()
                    )));
                }
                Err(TryLockError::Error(e)) => {
                    return Err(StateError::LockFailed(format!("{}: {e}", path.display())));
                }
            }
        }
        trace!("locked {}", path.display());

        Ok(Self { file, path })
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        trace!("unlocked {}", self.path.display());
    }
}

fn lock_path(record: &Path) -> PathBuf {
    let mut name = record.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    record.with_file_name(name)
}

/// Replace `path` with `contents` via a temp file and rename, so readers never
/// see a partially written record.
pub fn write_atomic(path: &Path, contents: &[u8]) -> StateResult<()> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp.{}", std::process::id()));
    let tmp = path.with_file_name(name);

    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })?;

    Ok(())
}
