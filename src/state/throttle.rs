//! ThrottleStore - persistent "last fired" timestamps per key
//!
//! One file per key under the throttle directory, holding the unix timestamp
//! of the last time the key fired. The same primitive gates both "may this
//! scan run" and "may this alert be sent".
//!
//! ## Decision
//!
//! ```text
//! no record / unreadable record → write now, fire
//! now - last >= interval        → write now, fire
//! otherwise                     → leave record untouched, hold
//! ```
//!
//! The read-modify-write runs under an exclusive file lock, so overlapping
//! invocations never both fire for the same key inside one interval.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::clock::Clock;
use super::error::{StateError, StateResult};
use super::lock::{LOCK_WAIT, RecordLock, write_atomic};

#[derive(Clone)]
pub struct ThrottleStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    lock_wait: Duration,
}

impl std::fmt::Debug for ThrottleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleStore")
            .field("dir", &self.dir)
            .field("lock_wait", &self.lock_wait)
            .finish_non_exhaustive()
    }
}

impl ThrottleStore {
    /// Open (and create if needed) a throttle directory.
    pub fn open(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> StateResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|_| StateError::InvalidStateDir(dir.clone()))?;
        Ok(Self {
            dir,
            clock,
            lock_wait: LOCK_WAIT,
        })
    }

    /// Give up on a record lock held by someone else after `wait`.
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Returns true if at least `interval` seconds have passed since `key` last
    /// fired, recording now as the new firing. A true result is a committed
    /// firing, so only ask when you intend to act on it.
    ///
    /// State errors never suppress: if the record cannot be locked, read or
    /// written the answer is true.
    pub fn should_run(&self, key: &str, interval: u64) -> bool {
        match self.decide(key, interval) {
            Ok(fire) => fire,
            Err(e) => {
                warn!("throttle {key}: {e}, proceeding");
                true
            }
        }
    }

    /// Timestamp of the last firing of `key`, if a readable record exists.
    pub fn last_fired(&self, key: &str) -> Option<i64> {
        let path = self.record_path(key).ok()?;
        read_record(&path)
    }

    fn decide(&self, key: &str, interval: u64) -> StateResult<bool> {
        let path = self.record_path(key)?;
        let _lock = RecordLock::acquire_within(&path, self.lock_wait)?;

        let now = self.clock.now();
        let interval = i64::try_from(interval).unwrap_or(i64::MAX);

        if let Some(last) = read_record(&path) {
            let elapsed = now.saturating_sub(last);
            if elapsed < interval {
                trace!("throttle {key}: {elapsed}s since last firing (interval {interval}s)");
                return Ok(false);
            }
            debug!("throttle {key}: {elapsed}s elapsed, firing");
        } else {
            debug!("throttle {key}: no record, firing");
        }

        write_atomic(&path, now.to_string().as_bytes())?;
        Ok(true)
    }

    fn record_path(&self, key: &str) -> StateResult<PathBuf> {
        Ok(self.dir.join(sanitize_key(key)?))
    }
}

fn read_record(path: &Path) -> Option<i64> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("unreadable throttle record {}: {e}", path.display());
            return None;
        }
    };

    match contents.trim().parse::<i64>() {
        Ok(ts) => Some(ts),
        Err(_) => {
            warn!("corrupt throttle record {}: {contents:?}", path.display());
            None
        }
    }
}

/// Map a key to a file name: anything outside `[A-Za-z0-9_.-]` becomes `_`.
pub fn sanitize_key(key: &str) -> StateResult<String> {
    let key = key.trim();
    if key.is_empty() || key.chars().all(|c| c == '.') {
        return Err(StateError::InvalidKey(key.to_string()));
    }

    Ok(key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect())
}
