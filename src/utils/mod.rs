//! Utility functions shared by the index and the server.
//!
//! ## Modules
//!
//! - [`app_data`] - Configuration and data directory resolution
//! - [`encoding`] - Byte-order aware fixed-width integer I/O
//! - [`normalize`] - Needle folding to lowercase ASCII words
//! - [`progress`] - Progress bars for bulk imports
//! - [`trigram`] - Padded trigram extraction
//!
//! ## Key Functions
//!
//! ```no_run
//! use fuzzmap::utils::{needle_trigrams, normalize};
//!
//! let needle = normalize("Zürich");
//! assert_eq!(needle, "zurich");
//!
//! // "**z", "*zu", "zur", "uri", "ric", "ich", "ch*"
//! assert_eq!(needle_trigrams(&needle).len(), 7);
//! ```

pub mod app_data;
pub mod encoding;
pub mod normalize;
pub mod progress;
pub mod trigram;

pub use app_data::*;
pub use encoding::*;
pub use normalize::*;
pub use trigram::*;
