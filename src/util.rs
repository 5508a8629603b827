use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

const HOSTGUARD_CONFIG: &str = "HOSTGUARD_CONFIG";

pub fn get_config_path() -> PathBuf {
    std::env::var_os(HOSTGUARD_CONFIG).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

const HOSTGUARD_STATE_DIR: &str = "HOSTGUARD_STATE_DIR";

pub fn get_state_dir() -> Option<PathBuf> {
    std::env::var_os(HOSTGUARD_STATE_DIR)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

/// Search `PATH` for an executable called `program`.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}
