use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reference {value} out of range (0..={max})")]
    InvalidReference { value: u64, max: u32 },

    #[error("weight {value} out of range (0..={max})")]
    InvalidWeight { value: u64, max: u32 },

    #[error("limit {value} out of range ({min}..={max})")]
    InvalidLimit { value: usize, min: usize, max: usize },

    #[error("no such map file: {}", .0.display())]
    NotFound(PathBuf),

    #[error("bad map file {}: {reason}", .path.display())]
    BadFormat { path: PathBuf, reason: String },

    #[error("map was closed")]
    Closed,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to save {}", format_failures(.0))]
    SaveAll(Vec<(String, Error)>),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn bad_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::BadFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for a missing map file, which callers treat as "new database".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

fn format_failures(failures: &[(String, Error)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name} ({err})"))
        .collect::<Vec<_>>()
        .join(", ")
}
