// src/services/cache.rs
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::models::{Allocation, MacroSnapshot};

/// Everything the snapshot file carries besides its date stamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheContents {
    /// Fund code → daily return text as published ("0,45", "N/A", ...).
    #[serde(default)]
    pub daily_returns: HashMap<String, String>,
    #[serde(default)]
    pub allocations: HashMap<String, Allocation>,
    #[serde(default)]
    pub macro_data: MacroSnapshot,
}

impl CacheContents {
    pub fn is_empty(&self) -> bool {
        self.daily_returns.is_empty() && self.allocations.is_empty() && self.macro_data.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct CacheSnapshot<C> {
    date: NaiveDate,
    #[serde(flatten)]
    contents: C,
}

/// Day-keyed JSON snapshot on disk. Valid only for the calendar day
/// (in the market timezone) it was written on.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
    tz: Tz,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>, tz: Tz) -> Self {
        SnapshotCache { path: path.into(), tz }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Today's snapshot, or empty maps when the file is missing, unreadable
    /// or stamped with another day.
    pub fn load(&self) -> CacheContents {
        self.load_for(self.today())
    }

    pub fn load_for(&self, day: NaiveDate) -> CacheContents {
        match self.read_snapshot() {
            Ok(Some(snapshot)) if snapshot.date == day => {
                info!(
                    "Loaded cache from {}: {} daily returns, {} allocations, {} macro indicators",
                    self.path.display(),
                    snapshot.contents.daily_returns.len(),
                    snapshot.contents.allocations.len(),
                    snapshot.contents.macro_data.len()
                );
                snapshot.contents
            }
            Ok(Some(snapshot)) => {
                info!("Discarding cache dated {} (today is {})", snapshot.date, day);
                CacheContents::default()
            }
            Ok(None) => {
                debug!("No cache file at {}", self.path.display());
                CacheContents::default()
            }
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", self.path.display(), e);
                CacheContents::default()
            }
        }
    }

    /// Overwrite the file with `contents` stamped today. The caller's
    /// in-memory data stays authoritative whatever happens here.
    pub fn save(&self, contents: &CacheContents) -> Result<(), CacheError> {
        self.save_for(self.today(), contents)
    }

    pub fn save_for(&self, day: NaiveDate, contents: &CacheContents) -> Result<(), CacheError> {
        let snapshot = CacheSnapshot { date: day, contents };
        let result = serde_json::to_vec(&snapshot)
            .map_err(CacheError::from)
            .and_then(|bytes| fs::write(&self.path, bytes).map_err(CacheError::from));

        if let Err(e) = &result {
            error!("Failed to save cache to {}: {}", self.path.display(), e);
        }
        result
    }

    /// Delete the backing file. Missing file is not an error.
    pub fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed cache file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_snapshot(&self) -> Result<Option<CacheSnapshot<CacheContents>>, CacheError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }
}
