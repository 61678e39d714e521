pub mod build;
pub mod map;
pub mod reader;
pub mod registry;
pub mod stats;
pub mod types;
pub mod writer;

pub use map::TrigramMap;
pub use registry::Registry;
pub use types::*;
