use std::path::PathBuf;

use thiserror::Error;

use crate::element::DType;

/// Errors from store backends. Every variant says where the problem is.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Couldn't access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't (de)serialise {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Store at {} doesn't exist or isn't a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("No group '{group}' in the store")]
    NoSuchGroup { group: String },

    #[error("No dataset '{name}' in group '{group}'")]
    NoSuchDataset { group: String, name: String },

    #[error("No attribute '{key}' on '{target}'")]
    NoSuchAttribute { target: String, key: String },

    #[error("'{name}' isn't a valid dataset name")]
    BadDatasetName { name: String },

    #[error("Dataset '{path}' has shape {shape:?}; can't access {start}..{end} along axis {axis}")]
    BadHyperslab {
        path: String,
        shape: Vec<usize>,
        axis: usize,
        start: usize,
        end: usize,
    },

    #[error("Chunk written to '{path}' should have shape {expected:?}, got {actual:?}")]
    ChunkShape {
        path: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Dataset '{path}' holds {expected} elements, got {actual}")]
    DType {
        path: String,
        expected: DType,
        actual: DType,
    },

    #[error("Data for '{path}' should be {expected} bytes, but it's {actual} bytes")]
    BodySize {
        path: String,
        expected: u64,
        actual: u64,
    },
}
