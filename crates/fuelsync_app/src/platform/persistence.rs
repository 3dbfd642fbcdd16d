use std::fs;
use std::path::{Path, PathBuf};

use fuelsync_engine::AtomicFileWriter;
use fuelsync_logging::{sync_debug, sync_error, sync_info, sync_warn};
use serde::{Deserialize, Serialize};

const STATE_FILENAME: &str = ".fuelsync_state.ron";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    #[serde(rename = "serverUrl", default)]
    server_url: Option<String>,
}

/// Reads the saved server address; anything missing or unreadable is `None`.
pub(crate) fn load_server_url(state_dir: &Path) -> Option<String> {
    let path = state_dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            sync_debug!("No saved state at {:?}", path);
            return None;
        }
        Err(err) => {
            sync_warn!("Failed to read saved state from {:?}: {}", path, err);
            return None;
        }
    };

    match ron::from_str::<PersistedState>(&content) {
        Ok(state) => state.server_url,
        Err(err) => {
            sync_warn!("Failed to parse saved state from {:?}: {}", path, err);
            None
        }
    }
}

pub(crate) fn save_server_url(state_dir: &Path, url: &str) {
    let state = PersistedState {
        server_url: Some(url.to_string()),
    };
    let content = match ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::new()) {
        Ok(text) => text,
        Err(err) => {
            sync_error!("Failed to serialize saved state: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(PathBuf::from(state_dir));
    match writer.write(STATE_FILENAME, &content) {
        Ok(path) => sync_info!("Saved server address to {:?}", path),
        Err(err) => sync_error!("Failed to write saved state to {:?}: {}", state_dir, err),
    }
}
