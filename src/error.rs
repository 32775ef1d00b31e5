//! Error type shared by every navball skin operation.

use std::path::PathBuf;

/// Failure modes of texture resolution, snapshot export and configuration.
///
/// Only [`SkinError::MissingSkinDirectory`] is fatal; every other variant is
/// logged by the operation that produced it and turned into a no-op.
#[derive(Debug, thiserror::Error)]
pub enum SkinError {
    /// A configured texture url matched neither the library nor the skin
    /// directory.
    #[error("texture url '{url}' not found")]
    AssetNotFound { url: String },
    /// The source texture has a zero extent and cannot be copied.
    #[error("texture dimensions must be non-zero (got {width}×{height})")]
    InvalidDimensions { width: u32, height: u32 },
    /// The source texture holds no CPU-side pixel data.
    #[error("texture has no CPU-readable pixel data")]
    NotReadable,
    /// The texture format has no RGBA8 conversion, e.g. block-compressed
    /// formats.
    #[error("texture format {format} cannot be converted to RGBA8")]
    UnsupportedFormat { format: String },
    #[error("insufficient permissions to write '{}'", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o failure on '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode png")]
    Encode(#[from] image::ImageError),
    #[error("failed to parse config '{}'", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The skin directory has no entry in the texture library.
    #[error("skin directory '{url}' not found in texture library")]
    MissingSkinDirectory { url: String },
}

impl SkinError {
    /// Wrap an I/O error, keeping permission failures distinguishable.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            SkinError::PermissionDenied { path, source }
        } else {
            SkinError::Io { path, source }
        }
    }

    /// This error followed by every underlying cause, for log lines.
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            report.push_str(": ");
            report.push_str(&cause.to_string());
            source = cause.source();
        }
        report
    }
}
