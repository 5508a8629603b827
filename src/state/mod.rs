//! Persistent agent state
//!
//! Everything an invocation remembers for the next one lives below the state
//! directory:
//!
//! ```text
//! <state_dir>/
//!   throttle/<key>           last firing, unix seconds
//!   throttle/<key>.lock
//!   manifests/<name>.manifest
//!   manifests/<name>.manifest.lock
//!   hostguard.log
//! ```

pub mod clock;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod throttle;

use std::path::Path;
use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StateError, StateResult};
pub use manifest::{Manifest, ManifestDiff, ManifestStore, Reconciliation};
pub use throttle::ThrottleStore;

/// Open both stores below `state_dir`.
pub fn open(state_dir: &Path, clock: Arc<dyn Clock>) -> StateResult<(ThrottleStore, ManifestStore)> {
    let throttle = ThrottleStore::open(state_dir.join("throttle"), clock)?;
    let manifests = ManifestStore::open(state_dir.join("manifests"))?;
    Ok((throttle, manifests))
}
