/// Command line and environment configuration
///
/// Nothing is persisted; every value comes from a flag, its environment
/// variable or the default.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::state::session::RowLayout;
use crate::state::viewport::DEFAULT_OVERSCAN;

#[derive(Parser, Debug, Clone)]
#[command(name = "cryview", version, about = "Browse and preview folders of encrypted containers")]
pub struct Settings {
    /// Engine program, run once per call
    #[arg(long, env = "CRYVIEW_ENGINE", default_value = "cry-engine")]
    pub engine: String,

    /// Extra argument passed to the engine program (repeatable)
    #[arg(long = "engine-arg", env = "CRYVIEW_ENGINE_ARGS", value_delimiter = ',')]
    pub engine_args: Vec<String>,

    /// File suffix of encrypted containers
    #[arg(long, env = "CRYVIEW_SUFFIX", default_value = ".cry")]
    pub suffix: String,

    /// Minimum password length for folder operations
    #[arg(long, env = "CRYVIEW_MIN_PASSWORD_LEN", default_value_t = 6)]
    pub min_password_len: usize,

    /// Give up waiting for a preview decrypt after this many seconds
    #[arg(long, env = "CRYVIEW_DECRYPT_TIMEOUT_SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub decrypt_timeout_secs: u64,

    /// Estimated height of a list row, in pixels
    #[arg(long, default_value_t = 110.0)]
    pub row_height: f32,

    /// Rows rendered beyond each edge of the list viewport
    #[arg(long, default_value_t = DEFAULT_OVERSCAN)]
    pub overscan: usize,

    /// Where decrypted previews are written
    #[arg(long, env = "CRYVIEW_ARTIFACT_DIR")]
    pub artifact_dir: Option<PathBuf>,

    /// Folder to open on the browse screen at start
    #[arg(long)]
    pub folder: Option<String>,
}

/// Compact rows never grow taller than the estimate
const COMPACT_ROW_HEIGHT: f32 = 40.0;

impl Settings {
    /// Bound on one preview decrypt
    pub fn decrypt_timeout(&self) -> Duration {
        Duration::from_secs(self.decrypt_timeout_secs)
    }

    /// Configured artifact directory, or `<cache>/cryview/artifacts`
    pub fn artifact_dir(&self) -> PathBuf {
        if let Some(dir) = &self.artifact_dir {
            return dir.clone();
        }

        let mut path = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir);
        path.push("cryview");
        path.push("artifacts");
        path
    }

    /// Row sizes for the browse list, clamped to at least one pixel
    pub fn row_layout(&self) -> RowLayout {
        let row_height = self.row_height.max(1.0);
        RowLayout {
            row_height,
            compact_height: COMPACT_ROW_HEIGHT.min(row_height),
            overscan: self.overscan,
        }
    }
}
