use std::{io, path::PathBuf};
use thiserror::Error;

/// Rejected page grid configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("page grid needs at least 2x2 points, got {horizontal}x{vertical}")]
    TooFewPoints { horizontal: u32, vertical: u32 },
}

/// Failure to open a document as a page source.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("unsupported document format: {0}")]
    Unsupported(PathBuf),
    #[error("document {0} contains no pages")]
    Empty(PathBuf),
    #[error("io error opening {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Failure to rasterise a single page.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("page {index} out of range (document has {count} pages)")]
    OutOfRange { index: usize, count: usize },
    #[error("image codec: {0}")]
    Image(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error(transparent)]
    Open(#[from] OpenError),
}

/// Failure while building or reading the on-disk book cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("failed to decode page {page}: {source}")]
    Page {
        page: usize,
        #[source]
        source: DecodeError,
    },
    #[error("page {page}: could not reopen the source: {reason}")]
    Reopen { page: usize, reason: String },
    #[error("cache io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache directory {0} has no low resolution pages")]
    NoPages(PathBuf),
}
