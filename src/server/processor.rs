//! Executes protocol commands against a [`Registry`]

use crate::error::Result;
use crate::index::registry::Registry;
use crate::index::types::Reference;
use crate::server::protocol::{Command, Reply, parse_command};
use crate::utils::normalize;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::{debug, trace};

/// Cached FIND results of one database, keyed by normalized needle and limit
type FindCache = LruCache<(String, usize), Vec<Reference>>;

/// Stateful command executor.
///
/// Owns the registry, so the daemon serializes every command (and every
/// periodic save) through a single lock around this value.
pub struct CommandProcessor {
    registry: Registry,
    caches: HashMap<String, FindCache>,
    cache_size: Option<NonZeroUsize>,
    cache_hits: u64,
    cache_misses: u64,
}

impl CommandProcessor {
    /// `cache_size` of 0 disables FIND caching
    pub fn new(registry: Registry, cache_size: usize) -> Self {
        Self {
            registry,
            caches: HashMap::new(),
            cache_size: NonZeroUsize::new(cache_size),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Parse and execute one request line, always producing a reply
    pub fn process_line(&mut self, line: &str) -> Reply {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "rejected request");
                return Reply::Error(e.to_string());
            }
        };

        match self.execute(command) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "command failed");
                Reply::Error(e.to_string())
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<Reply> {
        let limits = *self.registry.limits();
        match command {
            Command::Put {
                db,
                needle,
                reference,
                weight,
            } => {
                let reference = limits.reference(reference)?;
                let weight = limits.weight(weight)?;
                let added = self.registry.get_or_create(&db)?.put(&needle, reference, weight)?;
                if added > 0 {
                    self.caches.remove(&db);
                }
                Ok(Reply::Ok)
            }
            Command::Find { db, needle, limit } => {
                let limit = match limit {
                    None | Some(0) => limits.default_limit,
                    Some(limit) => limit,
                };
                self.find(&db, &needle, limit).map(Reply::Found)
            }
            Command::Delete { db, reference } => {
                let reference = limits.reference(reference)?;
                self.registry.get_or_create(&db)?.delete(reference)?;
                self.caches.remove(&db);
                Ok(Reply::Ok)
            }
            Command::Clear { db } => {
                self.registry.clear(&db);
                self.caches.remove(&db);
                Ok(Reply::Ok)
            }
        }
    }

    fn find(&mut self, db: &str, needle: &str, limit: usize) -> Result<Vec<Reference>> {
        let map = self.registry.get_or_create(db)?;
        let Some(cache_size) = self.cache_size else {
            return Ok(map.find(needle, limit)?.into_iter().map(|m| m.reference).collect());
        };

        let key = (normalize(needle), limit);
        let cache = self
            .caches
            .entry(db.to_string())
            .or_insert_with(|| LruCache::new(cache_size));
        if let Some(refs) = cache.get(&key) {
            self.cache_hits += 1;
            trace!(db, needle, "find cache hit");
            return Ok(refs.clone());
        }

        self.cache_misses += 1;
        let refs: Vec<Reference> = map.find(needle, limit)?.into_iter().map(|m| m.reference).collect();
        cache.put(key, refs.clone());
        Ok(refs)
    }

    /// Persist every loaded database
    pub fn save_all(&mut self) -> Result<()> {
        self.registry.save_all()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// (hits, misses) of the FIND cache
    pub fn cache_stats(&self) -> (u64, u64) {
        (self.cache_hits, self.cache_misses)
    }
}
