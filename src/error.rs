use std::path::PathBuf;

/// Error type for grid, codec and tile store operations.
#[derive(Debug)]
pub enum TileError {
    /// The grid or build configuration is unusable.
    InvalidConfig(String),
    /// Filesystem failure on a specific path.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A tile could not be serialized.
    Encode(String),
    /// A tile file is corrupt, truncated or of an unknown format.
    Decode(String),
}

impl TileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TileError::Io {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for TileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TileError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            TileError::Io { path, source } => write!(f, "IO error on {:?}: {}", path, source),
            TileError::Encode(msg) => write!(f, "Tile encode error: {}", msg),
            TileError::Decode(msg) => write!(f, "Tile decode error: {}", msg),
        }
    }
}

impl std::error::Error for TileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TileError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
