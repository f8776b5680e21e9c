//! Error types for the watchface-normalize crate.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while normalizing or syncing images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Metadata or configuration JSON could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The background removal collaborator failed.
    #[error("background removal failed: {0}")]
    Segmentation(String),

    /// The background removal collaborator did not finish in time.
    #[error("background removal timed out after {}s", .0.as_secs())]
    SegmentationTimeout(Duration),

    /// A brand ratio outside `(0, 1]` was configured.
    #[error("invalid ratio {ratio} for brand '{brand}' (expected 0 < ratio <= 1)")]
    InvalidRatio {
        /// Brand the ratio was configured for.
        brand: String,
        /// The rejected ratio.
        ratio: f64,
    },

    /// The input root folder does not exist.
    #[error("input folder does not exist: {}", .0.display())]
    MissingInputRoot(PathBuf),

    /// A required output directory could not be created.
    #[error("failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The WebP encoder rejected the image.
    #[error("WebP encoding failed: {0}")]
    WebpEncode(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let timeout = Error::SegmentationTimeout(Duration::from_secs(30));
        assert!(timeout.to_string().contains("30s"));

        let ratio = Error::InvalidRatio {
            brand: "omega".to_string(),
            ratio: 1.5,
        };
        let msg = ratio.to_string();
        assert!(msg.contains("omega"));
        assert!(msg.contains("1.5"));

        let missing = Error::MissingInputRoot(PathBuf::from("input"));
        assert!(missing.to_string().contains("input"));
    }

    #[test]
    fn output_dir_error_names_path_and_cause() {
        let err = Error::OutputDir {
            path: PathBuf::from("processed/omega/metadata"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("processed/omega/metadata"));
        assert!(msg.contains("denied"));
    }
}
