//! Source loader: turns the rides file (or a directory of persisted
//! records) into work items, bootstrapping a sample worklist when the
//! environment is freshly initialized.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::error::ResolveError;
use crate::fetch;
use crate::model::{slug_from_title, RouteRecord, WorkItem};

/// Lines without this host substring are not route references and are
/// silently skipped.
pub const HOST: &str = "ridewithgps.com";

const SAMPLE_RIDES: &str = "\
# Velo Routes worklist
# One RideWithGPS route URL per line, with an optional route type:
#   https://ridewithgps.com/routes/<id>, road
# Route types: road, gravel, mixed
# Lines starting with # are comments and are ignored.

https://ridewithgps.com/routes/12345, road
";

const HOWTO: &str = "\
Adding a route
==============

1. Create or find the route on RideWithGPS.
2. Copy its URL (like: https://ridewithgps.com/routes/123456).
3. Add it to rides.txt on its own line, optionally with a route type:
     https://ridewithgps.com/routes/123456, gravel
   Valid types: road, gravel, mixed. The type you specify always wins
   over whatever the build extracts from the page.
4. Run the build. It extracts the title, description, distance,
   elevation, and map thumbnail, and caches the result under routes/.
";

pub struct Worklist {
    pub items: Vec<WorkItem>,
    pub preloaded: Vec<RouteRecord>,
}

impl Worklist {
    pub fn len(&self) -> usize {
        self.items.len() + self.preloaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.preloaded.is_empty()
    }
}

/// Load the worklist. The rides file is the primary source; the records
/// directory is used only when it is absent. An empty result triggers the
/// sample-file bootstrap, so downstream stages always get at least one item.
pub fn load(rides_file: &Path, routes_dir: &Path) -> Result<Worklist> {
    let mut worklist = if rides_file.exists() {
        let text = fs::read_to_string(rides_file)
            .with_context(|| format!("reading {}", rides_file.display()))?;
        Worklist {
            items: parse_rides(&text),
            preloaded: Vec::new(),
        }
    } else {
        info!(
            "{} not found, loading records from {}",
            rides_file.display(),
            routes_dir.display()
        );
        Worklist {
            items: Vec::new(),
            preloaded: load_records_dir(routes_dir),
        }
    };

    if worklist.is_empty() {
        info!("no routes found, writing sample worklist");
        write_sample_files(rides_file)?;
        let text = fs::read_to_string(rides_file)
            .with_context(|| format!("reading {}", rides_file.display()))?;
        worklist = Worklist {
            items: parse_rides(&text),
            preloaded: Vec::new(),
        };
    }

    Ok(worklist)
}

/// Parse the line-oriented worklist. Blank lines and `#` comments are
/// skipped, as are lines without the expected host. An unrecognized route
/// type token rejects the whole line.
pub fn parse_rides(text: &str) -> Vec<WorkItem> {
    let mut items = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !line.contains(HOST) {
            continue;
        }

        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let url = parts[0].to_string();

        let surface_override = match parts.get(1) {
            Some(token) if !token.is_empty() => match token.parse() {
                Ok(surface) => Some(surface),
                Err(e) => {
                    warn!("skipping {url}: {e}");
                    continue;
                }
            },
            _ => None,
        };

        let id = fetch::route_id_from_url(&url);
        items.push(WorkItem {
            id,
            url,
            surface_override,
        });
    }

    items
}

/// Load every `*.json` record in the directory, skipping (with a warning)
/// any file missing its required fields.
pub fn load_records_dir(dir: &Path) -> Vec<RouteRecord> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        match read_record(&path) {
            Ok(record) => {
                info!("loaded {}", record.title);
                records.push(record);
            }
            Err(e) => warn!("{e}"),
        }
    }
    records
}

fn read_record(path: &Path) -> Result<RouteRecord, ResolveError> {
    let malformed = |reason: String| ResolveError::MalformedRecord {
        path: path.to_path_buf(),
        reason,
    };

    let text = fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
    let mut record: RouteRecord =
        serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))?;

    if record.title.trim().is_empty() || record.rwgps_url.trim().is_empty() {
        return Err(malformed(
            "missing required fields (title, rwgpsUrl)".to_string(),
        ));
    }
    if record.id.trim().is_empty() {
        record.id = slug_from_title(&record.title);
    }
    Ok(record)
}

fn write_sample_files(rides_file: &Path) -> Result<()> {
    fs::write(rides_file, SAMPLE_RIDES)
        .with_context(|| format!("writing sample {}", rides_file.display()))?;
    let howto_path = rides_file.with_file_name("ROUTES_HOWTO.txt");
    fs::write(&howto_path, HOWTO)
        .with_context(|| format!("writing {}", howto_path.display()))?;
    info!(
        "created {} and {}",
        rides_file.display(),
        howto_path.display()
    );
    Ok(())
}
