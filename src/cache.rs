//! Persistent route cache: one externally-readable JSON file per route id.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::ResolveError;
use crate::model::RouteRecord;

pub struct RouteCache {
    dir: PathBuf,
}

impl RouteCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        RouteCache { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Ok(None) when nothing is cached under this id. A file that exists
    /// but does not parse is a MalformedRecord, handled at the item
    /// boundary like any other per-item failure.
    pub fn lookup(&self, id: &str) -> Result<Option<RouteRecord>, ResolveError> {
        let path = self.path_for(id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ResolveError::MalformedRecord {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ResolveError::MalformedRecord {
                path,
                reason: e.to_string(),
            })
    }

    /// Idempotent overwrite, pretty-printed so the files stay hand-editable.
    pub fn put(&self, record: &RouteRecord) -> Result<(), ResolveError> {
        let path = self.path_for(&record.id);
        let write_err = |reason: String| ResolveError::CacheWrite {
            path: path.clone(),
            reason,
        };

        fs::create_dir_all(&self.dir).map_err(|e| write_err(e.to_string()))?;
        let json = serde_json::to_string_pretty(record).map_err(|e| write_err(e.to_string()))?;
        fs::write(&path, json).map_err(|e| write_err(e.to_string()))
    }
}
