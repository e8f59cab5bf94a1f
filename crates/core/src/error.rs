//! Error types for rillmap

use thiserror::Error;

/// Main error type for rillmap operations.
///
/// The first four variants are the hydrology failure taxonomy: they abort a
/// run. Recoverable conditions (breach fallbacks, an empty stream network,
/// a missing evidence layer) are reported as warnings in the run report
/// instead of through this type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Conditioning error: {0}")]
    Conditioning(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Threshold error: {0}")]
    Threshold(String),

    #[error("CRS mismatch: {0} cannot be transformed to {1}")]
    CrsMismatch(String, String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Vector error: {0}")]
    Vector(String),

    #[error("{0}")]
    Other(String),
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

/// Result type alias for rillmap operations
pub type Result<T> = std::result::Result<T, Error>;
