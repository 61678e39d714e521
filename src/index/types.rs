use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trigram code: three base-28 symbols packed into a u16
pub type Trigram = u16;

/// Caller-supplied secondary sort key (lighter sorts first)
pub type Weight = u32;

/// Opaque caller identifier of the record a needle stands for.
///
/// At most one needle is associated with a reference in a given map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference(pub u32);

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for Reference {
    fn from(value: u32) -> Self {
        Reference(value)
    }
}

/// Posting entry - one reference registered under a trigram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub reference: Reference,
    pub weight: Weight,
}

/// One ranked `find` result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub reference: Reference,
    /// Number of the query's trigrams shared with the stored needle
    pub score: u32,
    pub weight: Weight,
}

/// Counters reported by `stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStats {
    /// Active references
    pub references: u32,
    /// Distinct trigram keys with at least one posting
    pub trigrams: u32,
}

/// Accepted value ranges for map operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest accepted reference
    pub max_reference: u32,
    /// Largest accepted weight
    pub max_weight: u32,
    /// Result count used when a caller does not pick one
    pub default_limit: usize,
    /// Largest accepted result count
    pub max_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_reference: 1 << 31,
            max_weight: 1 << 31,
            default_limit: 10,
            max_limit: 1024,
        }
    }
}

impl Limits {
    /// Smallest accepted result count
    pub const MIN_LIMIT: usize = 1;

    pub fn reference(&self, value: u64) -> Result<Reference> {
        match u32::try_from(value) {
            Ok(v) if v <= self.max_reference => Ok(Reference(v)),
            _ => Err(Error::InvalidReference {
                value,
                max: self.max_reference,
            }),
        }
    }

    pub fn weight(&self, value: u64) -> Result<Weight> {
        match u32::try_from(value) {
            Ok(v) if v <= self.max_weight => Ok(v),
            _ => Err(Error::InvalidWeight {
                value,
                max: self.max_weight,
            }),
        }
    }

    pub fn limit(&self, value: usize) -> Result<usize> {
        if (Self::MIN_LIMIT..=self.max_limit).contains(&value) {
            Ok(value)
        } else {
            Err(Error::InvalidLimit {
                value,
                min: Self::MIN_LIMIT,
                max: self.max_limit,
            })
        }
    }
}
