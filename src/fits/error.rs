//! Error types for the FITS section store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated file: {0}")]
    Truncated(String),

    #[error("header starting at byte {0} has no END card")]
    MissingEnd(usize),

    #[error("missing keyword {0}")]
    MissingKeyword(String),

    #[error("invalid value for keyword {key}: {value}")]
    InvalidKeyword { key: String, value: String },

    #[error("unsupported column format: {0}")]
    UnsupportedFormat(String),

    #[error("section {0} is not a binary table")]
    NotBinaryTable(usize),

    #[error("file has no sections")]
    Empty,
}

pub type Result<T> = std::result::Result<T, FitsError>;
