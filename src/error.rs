//! Errors surfaced by the container framework.

use thiserror::Error;

use crate::{comm::CommError, distributed::DistributedError, element::DType, store::StoreError};

/// An axis or dataset declaration, shape or type doesn't agree with a schema.
/// These are never corrected automatically.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Axis '{name}' must have at least one element")]
    EmptyAxis { name: String },

    #[error("Cannot combine axes with different names ('{a}' and '{b}')")]
    AxisNameMismatch { a: String, b: String },

    #[error("Cannot combine labels of axis '{name}': {reason}")]
    AxisLabelMismatch { name: String, reason: &'static str },

    #[error("Index {index} is out of bounds for axis '{axis}' of length {len}")]
    SelectionOutOfBounds {
        axis: String,
        index: usize,
        len: usize,
    },

    #[error("Axis '{axis}' has no label {label}")]
    UnknownLabel { axis: String, label: String },

    #[error("Axis '{axis}' has {what} metadata that can't be interpreted")]
    BadAxisMetadata { axis: String, what: &'static str },

    #[error("Container type '{container_type}' declares axis '{axis}' more than once")]
    DuplicateAxis {
        container_type: String,
        axis: String,
    },

    #[error("Container type '{container_type}' declares dataset '{dataset}' more than once")]
    DuplicateDatasetSpec {
        container_type: String,
        dataset: String,
    },

    #[error("Dataset '{dataset}' of container type '{container_type}' is bound to axis '{axis}', which the type doesn't declare")]
    UndeclaredAxis {
        container_type: String,
        dataset: String,
        axis: String,
    },

    #[error("Dataset '{dataset}' is bound to axis '{axis}' more than once")]
    RepeatedDatasetAxis { dataset: String, axis: String },

    #[error("Dataset '{dataset}' already exists in this container")]
    DuplicateDataset { dataset: String },

    #[error("Container type '{name}' is already registered")]
    DuplicateContainerType { name: String },

    #[error("Container type '{name}' isn't registered")]
    UnknownContainerType { name: String },

    #[error("Dataset '{dataset}' is bound to axis '{axis}', but the container has no such axis")]
    DatasetAxisMissing { dataset: String, axis: String },

    #[error("Dataset '{dataset}' has length {actual} along axis '{axis}', but the axis has length {expected}")]
    ShapeMismatch {
        dataset: String,
        axis: String,
        expected: usize,
        actual: usize,
    },

    #[error("Dataset '{dataset}' expected data with shape {expected:?}, got {actual:?}")]
    DimensionMismatch {
        dataset: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Dataset '{dataset}' should be bound to axes {expected:?}, but it's bound to {actual:?}")]
    DatasetAxesMismatch {
        dataset: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Dataset '{dataset}' holds {expected} elements, not {actual}")]
    DTypeMismatch {
        dataset: String,
        expected: DType,
        actual: DType,
    },

    #[error("Container type '{container_type}' requires dataset '{dataset}', but it is absent")]
    MissingRequiredDataset {
        container_type: String,
        dataset: String,
    },

    #[error("Containers disagree on axis '{axis}'; they can't be combined")]
    IncompatibleAxis { axis: String },

    #[error("Containers of types '{a}' and '{b}' can't be combined")]
    IncompatibleContainerTypes { a: String, b: String },

    #[error("No containers were supplied")]
    NothingToConcatenate,
}

/// All errors from container operations.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Container type '{container_type}' doesn't declare a dataset called '{dataset}'")]
    UnknownDataset {
        container_type: String,
        dataset: String,
    },

    #[error("Dataset '{dataset}' needs axis '{axis}', which this container doesn't have")]
    MissingAxis { dataset: String, axis: String },

    #[error("This container doesn't have an axis called '{axis}'")]
    AxisAbsent { axis: String },

    #[error("Dataset '{dataset}' is declared but not present in this container")]
    DatasetAbsent { dataset: String },

    #[error("Group '{group}' doesn't hold a container (it has no type tag)")]
    NotAContainer { group: String },

    #[error("Worker {rank} failed during a collective operation")]
    PeerFailed { rank: usize },

    #[error(transparent)]
    Distributed(#[from] DistributedError),

    #[error(transparent)]
    Comm(#[from] CommError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
