//! Where finished (or abandoned) runs go. The pipeline and the flow never
//! touch the file system; callers hand a snapshot to a sink.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::core::flow::SessionSnapshot;

pub const FILE_PREFIX: &str = "career_quest_map_run_";

/// Attempts to find a free name when several runs finish in the same second.
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait SnapshotSink {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistError>;
}

/// Writes each snapshot as pretty JSON to
/// `career_quest_map_run_{YYYYMMDD_HHMMSS}.json` inside `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `snapshot`, returning the file's path. Never overwrites.
    pub fn write(&self, snapshot: &SessionSnapshot) -> Result<PathBuf, PersistError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        let mut attempt = 0;
        loop {
            let name = if attempt == 0 {
                format!("{}{}.json", FILE_PREFIX, stamp)
            } else {
                format!("{}{}_{}.json", FILE_PREFIX, stamp, attempt)
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())?;
                    info!(path = %path.display(), "run snapshot saved");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt + 1 < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn load(path: &Path) -> Result<SessionSnapshot, PersistError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl SnapshotSink for JsonFileSink {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistError> {
        self.write(snapshot).map(|_| ())
    }
}
