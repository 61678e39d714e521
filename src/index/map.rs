//! The in-memory trigram map.
//!
//! A [`TrigramMap`] associates normalized needles with caller references
//! through their padded trigrams, and ranks references for a query by the
//! number of trigrams they share with it.

use crate::error::{Error, Result};
use crate::index::types::{Limits, Match, MapStats, Posting, Reference, Trigram, Weight};
use crate::index::{reader, writer};
use crate::utils::{needle_trigrams, normalize};
use ahash::AHashMap;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Posting tables of an open map
#[derive(Debug, Default, Clone)]
pub(crate) struct MapData {
    /// Trigram -> postings, each list sorted by reference and never empty
    pub(crate) postings: AHashMap<Trigram, Vec<Posting>>,
    /// References present in at least one posting list
    pub(crate) references: RoaringBitmap,
}

/// Fuzzy lookup map from needles to references.
///
/// Not internally synchronized: callers sharing a map across threads wrap
/// it (or its owning [`Registry`](crate::index::Registry)) in a mutex.
#[derive(Debug)]
pub struct TrigramMap {
    /// `None` once the map has been closed
    data: Option<MapData>,
    limits: Limits,
    /// Mutated since the last load or save
    dirty: bool,
    /// File this map was last loaded from or saved to
    clean_path: Option<PathBuf>,
}

impl Default for TrigramMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TrigramMap {
    /// Create an empty map with default limits
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            data: Some(MapData::default()),
            limits,
            dirty: false,
            clean_path: None,
        }
    }

    /// Load a map saved with [`TrigramMap::save`].
    ///
    /// Fails with [`Error::NotFound`] if `path` does not exist and with
    /// [`Error::BadFormat`] if it is not a well-formed map file. The loaded
    /// map is clean with respect to `path`.
    pub fn load(path: impl AsRef<Path>, limits: Limits) -> Result<Self> {
        let path = path.as_ref();
        let data = reader::read_map(path)?;
        debug!(
            path = %path.display(),
            references = data.references.len(),
            trigrams = data.postings.len(),
            "loaded map"
        );

        Ok(Self {
            data: Some(data),
            limits,
            dirty: false,
            clean_path: Some(path.to_path_buf()),
        })
    }

    fn data(&self) -> Result<&MapData> {
        self.data.as_ref().ok_or(Error::Closed)
    }

    fn data_mut(&mut self) -> Result<&mut MapData> {
        self.data.as_mut().ok_or(Error::Closed)
    }

    /// Register `needle` under `reference`.
    ///
    /// Returns the number of distinct trigrams the needle was stored under,
    /// or 0 without any change if `reference` is already registered.
    pub fn put(&mut self, needle: &str, reference: Reference, weight: Weight) -> Result<usize> {
        let limits = self.limits;
        let data = self.data_mut()?;
        limits.reference(reference.0.into())?;
        limits.weight(weight.into())?;

        if data.references.contains(reference.0) {
            trace!(%reference, "reference already present, put ignored");
            return Ok(0);
        }

        let trigrams = needle_trigrams(&normalize(needle));
        let posting = Posting { reference, weight };
        for &trigram in &trigrams {
            let list = data.postings.entry(trigram).or_default();
            let pos = list.partition_point(|p| p.reference < reference);
            list.insert(pos, posting);
        }
        data.references.insert(reference.0);

        self.dirty = true;
        Ok(trigrams.len())
    }

    /// Remove `reference` from every posting list.
    ///
    /// Unknown references are not an error. The map is marked dirty either way.
    pub fn delete(&mut self, reference: Reference) -> Result<()> {
        let limits = self.limits;
        let data = self.data_mut()?;
        limits.reference(reference.0.into())?;

        if data.references.remove(reference.0) {
            data.postings.retain(|_, list| {
                if let Ok(pos) = list.binary_search_by(|p| p.reference.cmp(&reference)) {
                    list.remove(pos);
                }
                !list.is_empty()
            });
        }

        self.dirty = true;
        Ok(())
    }

    /// Find up to `limit` references whose needles share trigrams with `needle`.
    ///
    /// Results are ordered by descending score, then ascending weight, then
    /// ascending reference.
    pub fn find(&self, needle: &str, limit: usize) -> Result<Vec<Match>> {
        let data = self.data()?;
        let limit = self.limits.limit(limit)?;

        let trigrams = needle_trigrams(&normalize(needle));
        let mut scores: FxHashMap<Reference, (u32, Weight)> = FxHashMap::default();
        for trigram in &trigrams {
            if let Some(list) = data.postings.get(trigram) {
                for posting in list {
                    scores.entry(posting.reference).or_insert((0, posting.weight)).0 += 1;
                }
            }
        }

        let mut matches: Vec<Match> = scores
            .into_iter()
            .map(|(reference, (score, weight))| Match {
                reference,
                score,
                weight,
            })
            .collect();

        // Partial selection first: only the top `limit` need a full sort
        if matches.len() > limit {
            matches.select_nth_unstable_by(limit - 1, rank);
            matches.truncate(limit);
        }
        matches.sort_unstable_by(rank);

        trace!(needle, candidates = matches.len(), "find");
        Ok(matches)
    }

    /// [`find`](Self::find) with the configured default limit
    pub fn find_default(&self, needle: &str) -> Result<Vec<Match>> {
        self.find(needle, self.limits.default_limit)
    }

    pub fn stats(&self) -> Result<MapStats> {
        let data = self.data()?;
        Ok(MapStats {
            references: data.references.len() as u32,
            trigrams: data.postings.len() as u32,
        })
    }

    /// Whether `reference` is currently registered
    pub fn contains(&self, reference: Reference) -> Result<bool> {
        Ok(self.data()?.references.contains(reference.0))
    }

    /// Number of active references
    pub fn len(&self) -> Result<usize> {
        Ok(self.data()?.references.len() as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.data()?.references.is_empty())
    }

    /// Write the map to `path`.
    ///
    /// Nothing is written when the map is unchanged since it was last loaded
    /// from or saved to this same path. Any other save writes the whole map
    /// and makes it clean with respect to `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self.data()?;

        if !self.dirty && self.clean_path.as_deref() == Some(path) {
            trace!(path = %path.display(), "map clean, save skipped");
            return Ok(());
        }

        writer::write_map(data, path)?;
        debug!(path = %path.display(), references = data.references.len(), "saved map");

        self.dirty = false;
        self.clean_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Release the posting tables. Every later call fails with [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        self.data.take().map(drop).ok_or(Error::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clean_path(&self) -> Option<&Path> {
        self.clean_path.as_deref()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

/// Result order: best score first, lighter first, then by reference
fn rank(a: &Match, b: &Match) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.weight.cmp(&b.weight))
        .then(a.reference.cmp(&b.reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(matches: &[Match]) -> Vec<u32> {
        matches.iter().map(|m| m.reference.0).collect()
    }

    #[test]
    fn test_put_stores_references() {
        let mut map = TrigramMap::new();
        assert_eq!(map.put("foobar", Reference(123), 0).unwrap(), 7);
        assert_eq!(
            map.stats().unwrap(),
            MapStats {
                references: 1,
                trigrams: 7
            }
        );
        assert!(map.is_dirty());
    }

    #[test]
    fn test_put_same_reference_is_noop() {
        let mut map = TrigramMap::new();
        map.put("foobar", Reference(123), 0).unwrap();
        let before = map.find("foobar", 10).unwrap();

        assert_eq!(map.put("foobar", Reference(123), 5).unwrap(), 0);
        assert_eq!(map.put("paris", Reference(123), 0).unwrap(), 0);
        assert_eq!(map.stats().unwrap().trigrams, 7);
        assert_eq!(map.find("foobar", 10).unwrap(), before);
        assert!(map.find("paris", 10).unwrap().is_empty());
    }

    #[test]
    fn test_put_empty_and_symbol_needles() {
        let mut map = TrigramMap::new();
        map.put("", Reference(1), 0).unwrap();
        assert_eq!(map.stats().unwrap(), MapStats { references: 1, trigrams: 1 });

        let mut map = TrigramMap::new();
        map.put("@€%é", Reference(1), 0).unwrap();
        assert_eq!(map.stats().unwrap(), MapStats { references: 1, trigrams: 2 });
    }

    #[test]
    fn test_put_validates_ranges() {
        let mut map = TrigramMap::with_limits(Limits {
            max_reference: 100,
            max_weight: 10,
            ..Limits::default()
        });
        assert!(matches!(
            map.put("london", Reference(101), 0),
            Err(Error::InvalidReference { .. })
        ));
        assert!(matches!(
            map.put("london", Reference(1), 11),
            Err(Error::InvalidWeight { .. })
        ));
        assert_eq!(map.stats().unwrap(), MapStats::default());
        assert!(!map.is_dirty());
    }

    #[test]
    fn test_observers() {
        let mut map = TrigramMap::new();
        assert!(map.is_empty().unwrap());
        map.put("london", Reference(5), 0).unwrap();
        assert_eq!(map.len().unwrap(), 1);
        assert!(map.contains(Reference(5)).unwrap());
        assert!(!map.contains(Reference(6)).unwrap());
        map.close().unwrap();
        assert!(matches!(map.len(), Err(Error::Closed)));
    }

    #[test]
    fn test_delete_removes_everything() {
        let mut map = TrigramMap::new();
        map.put("london", Reference(123), 0).unwrap();
        map.delete(Reference(123)).unwrap();
        assert_eq!(map.stats().unwrap(), MapStats::default());
        assert!(map.find("london", 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_keeps_shared_trigrams() {
        let mut map = TrigramMap::new();
        map.put("london", Reference(1), 0).unwrap();
        map.put("londonderry", Reference(2), 0).unwrap();
        map.delete(Reference(2)).unwrap();

        let matches = map.find("london", 10).unwrap();
        assert_eq!(refs(&matches), vec![1]);
        assert_eq!(map.stats().unwrap().trigrams, 7);
    }

    #[test]
    fn test_delete_missing_marks_dirty() {
        let mut map = TrigramMap::new();
        map.delete(Reference(42)).unwrap();
        assert!(map.is_dirty());
        assert_eq!(map.stats().unwrap(), MapStats::default());
    }

    #[test]
    fn test_readd_after_delete() {
        let mut map = TrigramMap::new();
        map.put("london", Reference(1337), 0).unwrap();
        map.delete(Reference(1337)).unwrap();
        map.put("paris", Reference(1337), 0).unwrap();

        assert!(map.find("london", 10).unwrap().is_empty());
        assert_eq!(refs(&map.find("paris", 10).unwrap()), vec![1337]);
    }

    #[test]
    fn test_find_perfect_match() {
        let mut map = TrigramMap::new();
        map.put("london", Reference(123), 0).unwrap();
        let matches = map.find("london", 10).unwrap();
        assert_eq!(
            matches[0],
            Match {
                reference: Reference(123),
                score: 7,
                weight: 0
            }
        );
    }

    #[test]
    fn test_find_favours_exact_matches() {
        let mut map = TrigramMap::new();
        map.put("lon", Reference(125), 0).unwrap();
        map.put("london city airport", Reference(124), 0).unwrap();
        map.put("london", Reference(123), 0).unwrap();
        assert_eq!(map.find("london", 10).unwrap()[0].reference, Reference(123));
    }

    #[test]
    fn test_find_sorts_by_score() {
        let mut map = TrigramMap::new();
        map.put("New York", Reference(1001), 0).unwrap();
        map.put("Yorkshire", Reference(1002), 0).unwrap();
        map.put("York", Reference(1003), 0).unwrap();
        map.put("Yorkisthan", Reference(1004), 0).unwrap();

        let matches = map.find("York", 10).unwrap();
        assert_eq!(refs(&matches), vec![1003, 1001, 1002, 1004]);
        assert_eq!(matches[0].score, 5);
        assert!(matches[1..].iter().all(|m| m.score == 4));
    }

    #[test]
    fn test_find_lighter_first() {
        let mut map = TrigramMap::new();
        map.put("london", Reference(103), 103).unwrap();
        map.put("london", Reference(101), 101).unwrap();
        map.put("london", Reference(102), 102).unwrap();
        assert_eq!(refs(&map.find("london", 10).unwrap()), vec![101, 102, 103]);
    }

    #[test]
    fn test_find_tolerates_misspellings() {
        let mut map = TrigramMap::new();
        map.put("london", Reference(123), 0).unwrap();
        for needle in ["lonXdon", "lodon", "lodnon"] {
            assert!(!map.find(needle, 10).unwrap().is_empty(), "{needle}");
        }
    }

    #[test]
    fn test_find_limit() {
        let mut map = TrigramMap::new();
        for i in 0..5 {
            map.put("london", Reference(1000 + i), 0).unwrap();
        }
        assert_eq!(refs(&map.find("london", 2).unwrap()), vec![1000, 1001]);
        assert!(matches!(map.find("london", 0), Err(Error::InvalidLimit { .. })));
        assert!(map.find("london", 1025).is_err());
        assert_eq!(map.find_default("london").unwrap().len(), 5);
    }

    #[test]
    fn test_find_empty_map() {
        let map = TrigramMap::new();
        assert!(map.find("london", 10).unwrap().is_empty());
        assert!(map.find("", 10).unwrap().is_empty());
    }

    #[test]
    fn test_close_is_terminal() {
        let mut map = TrigramMap::new();
        map.put("london", Reference(1), 0).unwrap();
        map.close().unwrap();

        assert!(map.is_closed());
        assert!(matches!(map.close(), Err(Error::Closed)));
        assert!(matches!(map.put("paris", Reference(2), 0), Err(Error::Closed)));
        assert!(matches!(map.find("london", 10), Err(Error::Closed)));
        assert!(matches!(map.delete(Reference(1)), Err(Error::Closed)));
        assert!(matches!(map.stats(), Err(Error::Closed)));
        assert!(matches!(map.save("unused.trigrams"), Err(Error::Closed)));
    }

    #[test]
    fn test_repeated_put_delete_cycles() {
        let mut map = TrigramMap::new();
        for i in 0..1024 {
            map.put("Port-au-Prince", Reference(i), 0).unwrap();
            assert_eq!(map.find("Port-au-Prince", 10).unwrap()[0].reference, Reference(i));
            map.delete(Reference(i)).unwrap();
            assert_eq!(map.stats().unwrap(), MapStats::default());
        }
    }

    #[test]
    fn test_many_puts_then_deletes() {
        let mut map = TrigramMap::new();
        for i in 0..1024 {
            map.put("Port-au-Prince", Reference(i), 0).unwrap();
        }
        assert_eq!(map.stats().unwrap().references, 1024);
        for i in 0..1024 {
            map.delete(Reference(i)).unwrap();
        }
        assert_eq!(map.stats().unwrap(), MapStats::default());
        assert!(map.find("Port-au-Prince", 10).unwrap().is_empty());
    }
}
