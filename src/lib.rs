//! # fuzzmap - trigram fuzzy lookup
//!
//! fuzzmap maps short free-text needles (place names, titles, labels) to
//! caller-supplied integer references and finds the best candidates for a
//! misspelled or partial query by counting shared trigrams.
//!
//! ## Architecture
//!
//! - [`index`] - The trigram map, its file format and the named-map registry
//! - [`server`] - Line-protocol TCP service and client
//! - [`output`] - Result formatting for the CLI
//! - [`utils`] - Normalization, trigram extraction, byte encoding, configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use fuzzmap::{Reference, TrigramMap};
//!
//! let mut map = TrigramMap::new();
//! map.put("London", Reference(1), 0)?;
//! map.put("Londonderry", Reference(2), 0)?;
//!
//! for m in map.find("lundon", 10)? {
//!     println!("{} (score {})", m.reference, m.score);
//! }
//! map.save("places.trigrams")?;
//! # Ok::<(), fuzzmap::Error>(())
//! ```

pub mod error;
pub mod index;
pub mod output;
pub mod server;
pub mod utils;

pub use error::{Error, Result};
pub use index::{Limits, MapStats, Match, Reference, Registry, TrigramMap};
pub use utils::normalize;
