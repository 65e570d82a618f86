//! History file location for the REPL. Defaults to `~/.slotdb_history`;
//! override with the `SLOTDB_HISTORY` environment variable, or set it to
//! an empty string to disable persistence.

use std::env;
use std::path::PathBuf;

const DEFAULT_HISTORY_FILE: &str = ".slotdb_history";
const HISTORY_ENV_VAR: &str = "SLOTDB_HISTORY";

pub fn history_path() -> Option<PathBuf> {
    if let Ok(custom_path) = env::var(HISTORY_ENV_VAR) {
        if custom_path.is_empty() {
            return None;
        }
        return Some(PathBuf::from(custom_path));
    }

    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(DEFAULT_HISTORY_FILE))
}
