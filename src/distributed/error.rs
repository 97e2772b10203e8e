//! Errors associated with distributed arrays.

use std::ops::Range;

use thiserror::Error;

use crate::comm::CommError;

#[derive(Error, Debug)]
pub enum DistributedError {
    #[error("Index {index:?} isn't held by this worker; along the distributed axis {axis} it only holds {local:?}. Redistribute first")]
    OutOfLocalRange {
        index: Vec<usize>,
        axis: usize,
        local: Range<usize>,
    },

    #[error("Index {index:?} is out of bounds for an array of shape {shape:?}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },

    #[error("Axis {axis} doesn't exist in an array with {ndim} dimensions")]
    BadAxis { axis: usize, ndim: usize },

    #[error("Expected a local chunk of shape {expected:?}, got {actual:?}")]
    BadLocalShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("No arrays to concatenate")]
    NothingToConcatenate,

    #[error("Arrays with shapes {a:?} and {b:?} can't be joined along axis {axis}")]
    ConcatShape {
        a: Vec<usize>,
        b: Vec<usize>,
        axis: usize,
    },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Comm(#[from] CommError),
}
