use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE: &str = "hostguard.log";

/// Compact stderr output plus an append-only log file in `state_dir`. A log
/// file that cannot be opened leaves stderr only.
pub fn init(state_dir: &Path, level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("hostguard", level),
    ]);

    let _ = std::fs::create_dir_all(state_dir);
    let log_path = state_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&log_path);

    let file_layer = file.as_ref().ok().and_then(|f| f.try_clone().ok()).map(|f| {
        tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(f))
            .with_ansi(false)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(file_layer)
        .with(filter)
        .init();

    if let Err(e) = file {
        warn!("cannot open log file {}: {e}", log_path.display());
    }
}
