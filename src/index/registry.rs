//! Named maps persisted as `<dir>/<name>.trigrams`.

use crate::error::{Error, Result};
use crate::index::map::TrigramMap;
use crate::index::types::Limits;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extension of persisted maps
pub const MAP_EXTENSION: &str = "trigrams";

/// Backing file of the map called `name` inside `dir`
pub fn map_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{MAP_EXTENSION}"))
}

/// Collection of named maps backed by one directory.
///
/// Maps are loaded on first use and written back by [`Registry::save_all`].
#[derive(Debug)]
pub struct Registry {
    dir: PathBuf,
    limits: Limits,
    maps: BTreeMap<String, TrigramMap>,
}

impl Registry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_limits(dir, Limits::default())
    }

    pub fn with_limits(dir: impl Into<PathBuf>, limits: Limits) -> Self {
        Self {
            dir: dir.into(),
            limits,
            maps: BTreeMap::new(),
        }
    }

    /// Backing file of the map called `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        map_path(&self.dir, name)
    }

    /// Return the map called `name`, loading it from disk on first access.
    ///
    /// A missing file yields a fresh empty map; any other load failure is
    /// returned and nothing is cached.
    pub fn get_or_create(&mut self, name: &str) -> Result<&mut TrigramMap> {
        let path = self.path_for(name);
        match self.maps.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let map = match TrigramMap::load(&path, self.limits) {
                    Ok(map) => {
                        info!(name, "loaded database");
                        map
                    }
                    Err(e) if e.is_not_found() => {
                        info!(name, "new database");
                        TrigramMap::with_limits(self.limits)
                    }
                    Err(e) => return Err(e),
                };
                Ok(entry.insert(map))
            }
        }
    }

    /// Already-loaded map called `name`
    pub fn get(&self, name: &str) -> Option<&TrigramMap> {
        self.maps.get(name)
    }

    /// Save every loaded map to its backing file.
    ///
    /// Failures do not stop the remaining saves; they are collected into a
    /// single [`Error::SaveAll`].
    pub fn save_all(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let mut failures = Vec::new();
        for (name, map) in &mut self.maps {
            let path = map_path(&self.dir, name);
            if let Err(e) = map.save(&path) {
                warn!(name = name.as_str(), error = %e, "failed to save database");
                failures.push((name.clone(), e));
            }
        }

        if failures.is_empty() {
            debug!(count = self.maps.len(), "saved all databases");
            Ok(())
        } else {
            Err(Error::SaveAll(failures))
        }
    }

    /// Replace the map called `name` with a fresh empty one.
    ///
    /// The backing file is left alone; the next `save_all` overwrites it.
    pub fn clear(&mut self, name: &str) {
        let fresh = TrigramMap::with_limits(self.limits);
        if let Some(mut old) = self.maps.insert(name.to_string(), fresh) {
            // An old map closed by its caller is simply discarded
            let _ = old.close();
        }
        info!(name, "cleared database");
    }

    /// Names of the loaded maps, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}
