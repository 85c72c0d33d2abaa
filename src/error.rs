//! Error types for map export.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while exporting maps.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Missing or invalid setting. Aborts the whole run.
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration.
        message: String,
    },

    /// The parsed map container could not be read. Fatal for that map only.
    #[error("cannot read map {}: {message}", path.display())]
    MapRead {
        /// Map file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A tile value or texture could not be resolved. Recoverable: the tile
    /// or texture is skipped and the export continues.
    #[error("texture '{texture}': {message}")]
    TextureResolution {
        /// Texture name, or the tile value when no name is known.
        texture: String,
        /// Error message.
        message: String,
    },

    /// An output file could not be written. Fatal for that map.
    #[error("cannot write {}: {source}", path.display())]
    IoWrite {
        /// Output path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Image encode/decode failure.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON encode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn map_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MapRead {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn texture(texture: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TextureResolution {
            texture: texture.into(),
            message: message.into(),
        }
    }

    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Only configuration errors stop the whole run; everything else is
    /// confined to one map (or one tile).
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
