//! The boundary to persistent storage.
//!
//! A store is a tree of groups. Groups hold attributes and datasets; datasets
//! are n-dimensional arrays with a fixed element type and shape, plus their
//! own attributes. Dataset bodies are read and written in hyperslabs (a
//! contiguous range along one axis), so that each worker only touches its own
//! chunk.
//!
//! Group paths are '/'-separated; the root group is "" (or "/").

mod dir;
mod error;
mod memory;
pub(crate) mod slab;
#[cfg(test)]
mod tests;

pub use dir::DirStore;
pub use error::StoreError;
pub use memory::MemStore;

use std::{fmt::Debug, ops::Range};

use itertools::Itertools;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::{
    attrs::{AttrValue, Attributes},
    element::{self, DType, Element},
};

/// The header of a stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub dtype: DType,
    pub shape: Vec<usize>,
    #[serde(default)]
    pub attrs: Attributes,
}

impl DatasetInfo {
    /// The size of the dataset body in bytes.
    pub fn num_bytes(&self) -> usize {
        self.shape.iter().product::<usize>() * self.dtype.size()
    }
}

/// A contiguous range along one axis of a dataset, covering the whole of every
/// other axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    pub axis: usize,
    pub range: Range<usize>,
}

impl Hyperslab {
    /// The hyperslab covering all of a dataset with this shape.
    pub fn full(shape: &[usize]) -> Hyperslab {
        Hyperslab {
            axis: 0,
            range: 0..shape.first().copied().unwrap_or(1),
        }
    }

    /// The shape of the data selected from a dataset with shape `shape`.
    pub fn shape(&self, shape: &[usize]) -> Vec<usize> {
        let mut shape = shape.to_vec();
        if let Some(len) = shape.get_mut(self.axis) {
            *len = self.range.len();
        }
        shape
    }
}

/// Packed little-endian C-order bytes of an array chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub bytes: Vec<u8>,
}

impl RawChunk {
    pub fn from_array<T: Element>(array: ArrayViewD<T>) -> RawChunk {
        RawChunk {
            dtype: T::DTYPE,
            shape: array.shape().to_vec(),
            bytes: element::encode(array.iter()),
        }
    }

    /// Decode into an array. `path` is only used for error messages.
    pub fn into_array<T: Element>(self, path: &str) -> Result<ArrayD<T>, StoreError> {
        if self.dtype != T::DTYPE {
            return Err(StoreError::DType {
                path: path.to_string(),
                expected: T::DTYPE,
                actual: self.dtype,
            });
        }
        let expected = self.shape.iter().product::<usize>() * self.dtype.size();
        if self.bytes.len() != expected {
            return Err(StoreError::BodySize {
                path: path.to_string(),
                expected: expected as u64,
                actual: self.bytes.len() as u64,
            });
        }
        let values = element::decode::<T>(&self.bytes);
        // The length was checked above.
        ArrayD::from_shape_vec(IxDyn(&self.shape), values).map_err(|_| StoreError::ChunkShape {
            path: path.to_string(),
            expected: self.shape.clone(),
            actual: vec![self.bytes.len() / self.dtype.size()],
        })
    }
}

/// What an attribute is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrTarget<'a> {
    Group(&'a str),
    Dataset { group: &'a str, name: &'a str },
}

impl std::fmt::Display for AttrTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrTarget::Group(g) => write!(f, "/{}", normalise(g)),
            AttrTarget::Dataset { group, name } => write!(f, "{}", dataset_path(group, name)),
        }
    }
}

/// The primitives a hierarchical store offers to containers.
///
/// Implementations must allow different workers to write disjoint hyperslabs
/// of the same dataset at the same time.
pub trait Store: Debug + Send + Sync {
    /// Create a group and any missing parents. Succeeds if it already exists.
    fn create_group(&self, group: &str) -> Result<(), StoreError>;

    /// Check that a group exists.
    fn open_group(&self, group: &str) -> Result<(), StoreError>;

    /// Remove a group with its attributes, datasets and subgroups. Removing
    /// the root group empties the store. Succeeds if the group is absent.
    fn remove_group(&self, group: &str) -> Result<(), StoreError>;

    /// The names of the datasets directly in a group, sorted.
    fn list_datasets(&self, group: &str) -> Result<Vec<String>, StoreError>;

    /// Create (or replace) a zero-filled dataset.
    fn create_dataset(&self, group: &str, name: &str, info: &DatasetInfo)
        -> Result<(), StoreError>;

    fn dataset_info(&self, group: &str, name: &str) -> Result<DatasetInfo, StoreError>;

    /// Write `chunk` starting at `offset` along `axis`. The chunk must match
    /// the dataset on every other axis.
    fn write_dataset(
        &self,
        group: &str,
        name: &str,
        chunk: &RawChunk,
        axis: usize,
        offset: usize,
    ) -> Result<(), StoreError>;

    /// Read a hyperslab, or the whole dataset if `slab` is `None`.
    fn read_dataset(
        &self,
        group: &str,
        name: &str,
        slab: Option<&Hyperslab>,
    ) -> Result<RawChunk, StoreError>;

    fn write_attribute(
        &self,
        target: AttrTarget<'_>,
        key: &str,
        value: &AttrValue,
    ) -> Result<(), StoreError>;

    fn read_attributes(&self, target: AttrTarget<'_>) -> Result<Attributes, StoreError>;

    fn read_attribute(&self, target: AttrTarget<'_>, key: &str) -> Result<AttrValue, StoreError> {
        self.read_attributes(target)?
            .shift_remove(key)
            .ok_or_else(|| StoreError::NoSuchAttribute {
                target: target.to_string(),
                key: key.to_string(),
            })
    }
}

/// Strip redundant separators from a group path; the root is "".
pub fn normalise(group: &str) -> String {
    group.split('/').filter(|s| !s.is_empty()).join("/")
}

/// The path of a subgroup or dataset inside `parent`.
pub fn join(parent: &str, name: &str) -> String {
    let parent = normalise(parent);
    let name = normalise(name);
    match (parent.is_empty(), name.is_empty()) {
        (true, _) => name,
        (_, true) => parent,
        _ => format!("{parent}/{name}"),
    }
}

pub(crate) fn dataset_path(group: &str, name: &str) -> String {
    format!("/{}", join(group, name))
}

pub(crate) fn check_dataset_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.contains('/') || name.starts_with('.') {
        return Err(StoreError::BadDatasetName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Check that a chunk written at `offset` along `axis` fits the dataset, and
/// return the hyperslab it covers.
pub(crate) fn chunk_slab(
    path: &str,
    info: &DatasetInfo,
    chunk: &RawChunk,
    axis: usize,
    offset: usize,
) -> Result<Hyperslab, StoreError> {
    if chunk.dtype != info.dtype {
        return Err(StoreError::DType {
            path: path.to_string(),
            expected: info.dtype,
            actual: chunk.dtype,
        });
    }
    let len = chunk.shape.get(axis).copied().unwrap_or(1);
    let slab = Hyperslab {
        axis,
        range: offset..offset + len,
    };
    let expected = slab.shape(&info.shape);
    if chunk.shape != expected {
        return Err(StoreError::ChunkShape {
            path: path.to_string(),
            expected,
            actual: chunk.shape.clone(),
        });
    }
    let num_bytes = chunk.shape.iter().product::<usize>() * chunk.dtype.size();
    if chunk.bytes.len() != num_bytes {
        return Err(StoreError::BodySize {
            path: path.to_string(),
            expected: num_bytes as u64,
            actual: chunk.bytes.len() as u64,
        });
    }
    Ok(slab)
}
