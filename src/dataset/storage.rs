//! Array data of a dataset: local or distributed, of any element type.

use std::sync::Arc;

use ndarray::{concatenate, ArrayD, ArrayViewD, ArrayViewMutD, Axis};

use crate::{
    comm::Communicator,
    distributed::{DistributedArray, DistributedError},
    element::{with_dtype, DType, Element},
};

/// The data of a dataset with a known element type.
#[derive(Debug, Clone)]
pub enum Storage<T> {
    /// Every worker holds the whole array.
    Local(ArrayD<T>),
    Distributed(DistributedArray<T>),
}

impl<T: Element> Storage<T> {
    pub fn global_shape(&self) -> &[usize] {
        match self {
            Storage::Local(a) => a.shape(),
            Storage::Distributed(d) => d.global_shape(),
        }
    }

    pub fn local_shape(&self) -> &[usize] {
        match self {
            Storage::Local(a) => a.shape(),
            Storage::Distributed(d) => d.local_shape(),
        }
    }

    pub fn distributed_axis(&self) -> Option<usize> {
        match self {
            Storage::Local(_) => None,
            Storage::Distributed(d) => Some(d.axis()),
        }
    }

    /// Where this worker's part starts along the distributed axis.
    pub fn local_offset(&self) -> usize {
        match self {
            Storage::Local(_) => 0,
            Storage::Distributed(d) => d.local_offset(),
        }
    }

    /// This worker's part of the data.
    pub fn local(&self) -> ArrayViewD<T> {
        match self {
            Storage::Local(a) => a.view(),
            Storage::Distributed(d) => d.local_array(),
        }
    }

    pub fn local_mut(&mut self) -> ArrayViewMutD<T> {
        match self {
            Storage::Local(a) => a.view_mut(),
            Storage::Distributed(d) => d.local_array_mut(),
        }
    }

    /// The whole array. Collective for distributed data.
    pub fn to_full(&self) -> Result<ArrayD<T>, DistributedError> {
        match self {
            Storage::Local(a) => Ok(a.clone()),
            Storage::Distributed(d) => d.allgather(),
        }
    }

    pub fn select(&self, axis: usize, indices: &[usize]) -> Result<Self, DistributedError> {
        match self {
            Storage::Local(a) => {
                if axis >= a.ndim() {
                    return Err(DistributedError::BadAxis {
                        axis,
                        ndim: a.ndim(),
                    });
                }
                if let Some(&bad) = indices.iter().find(|&&i| i >= a.shape()[axis]) {
                    let mut index = vec![0; a.ndim()];
                    index[axis] = bad;
                    return Err(DistributedError::IndexOutOfBounds {
                        index,
                        shape: a.shape().to_vec(),
                    });
                }
                Ok(Storage::Local(a.select(Axis(axis), indices)))
            }
            Storage::Distributed(d) => Ok(Storage::Distributed(d.select(axis, indices)?)),
        }
    }

    /// Move distributed data to `axis`. Local data is left alone.
    pub fn redistribute(&self, axis: usize) -> Result<Self, DistributedError> {
        match self {
            Storage::Local(_) => Ok(self.clone()),
            Storage::Distributed(d) => Ok(Storage::Distributed(d.redistribute(axis)?)),
        }
    }

    /// Join `parts` along `axis`. If any part is distributed the result is
    /// distributed like the first distributed part.
    pub fn concatenate(axis: usize, parts: &[&Self]) -> Result<Self, DistributedError> {
        let distributed = parts.iter().find_map(|p| match p {
            Storage::Distributed(d) => Some(d),
            Storage::Local(_) => None,
        });
        match distributed {
            None => {
                let views: Vec<_> = parts.iter().map(|p| p.local()).collect();
                Ok(Storage::Local(concatenate(Axis(axis), &views)?))
            }
            Some(first) => {
                let comm: Arc<dyn Communicator> = Arc::clone(first.comm());
                let dist_axis = first.axis();
                let parts = parts
                    .iter()
                    .map(|p| match p {
                        Storage::Distributed(d) => Ok(d.clone()),
                        Storage::Local(a) => {
                            DistributedArray::from_global(a.view(), dist_axis, Arc::clone(&comm))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&DistributedArray<T>> = parts.iter().collect();
                Ok(Storage::Distributed(DistributedArray::concatenate(
                    axis, &refs,
                )?))
            }
        }
    }
}

/// [`Storage`] of any element type.
#[derive(Debug, Clone)]
pub enum TypedStorage {
    Bool(Storage<bool>),
    Uint8(Storage<u8>),
    Int32(Storage<i32>),
    Int64(Storage<i64>),
    Float32(Storage<f32>),
    Float64(Storage<f64>),
    Complex64(Storage<num_complex::Complex32>),
    Complex128(Storage<num_complex::Complex64>),
}

/// Evaluate `$body` with `$s` bound to the inner [`Storage`], whatever its
/// element type.
macro_rules! dispatch {
    ($storage:expr, $s:ident => $body:expr) => {
        match $storage {
            TypedStorage::Bool($s) => $body,
            TypedStorage::Uint8($s) => $body,
            TypedStorage::Int32($s) => $body,
            TypedStorage::Int64($s) => $body,
            TypedStorage::Float32($s) => $body,
            TypedStorage::Float64($s) => $body,
            TypedStorage::Complex64($s) => $body,
            TypedStorage::Complex128($s) => $body,
        }
    };
}

/// Like `dispatch!`, but `$body` makes a new `Storage` of the same type.
macro_rules! map_storage {
    ($storage:expr, $s:ident => $body:expr) => {
        match $storage {
            TypedStorage::Bool($s) => TypedStorage::Bool($body),
            TypedStorage::Uint8($s) => TypedStorage::Uint8($body),
            TypedStorage::Int32($s) => TypedStorage::Int32($body),
            TypedStorage::Int64($s) => TypedStorage::Int64($body),
            TypedStorage::Float32($s) => TypedStorage::Float32($body),
            TypedStorage::Float64($s) => TypedStorage::Float64($body),
            TypedStorage::Complex64($s) => TypedStorage::Complex64($body),
            TypedStorage::Complex128($s) => TypedStorage::Complex128($body),
        }
    };
}
pub(crate) use dispatch;

impl TypedStorage {
    /// Zero-filled storage. Distributed along `distributed_axis` if given.
    pub fn zeros(
        dtype: DType,
        shape: &[usize],
        distributed_axis: Option<usize>,
        comm: &Arc<dyn Communicator>,
    ) -> Result<TypedStorage, DistributedError> {
        with_dtype!(dtype, T => {
            let storage = match distributed_axis {
                Some(axis) => {
                    Storage::Distributed(DistributedArray::<T>::zeros(shape, axis, Arc::clone(comm))?)
                }
                None => Storage::Local(ArrayD::from_elem(shape, <T as Element>::zero())),
            };
            Ok(T::wrap(storage))
        })
    }

    pub fn dtype(&self) -> DType {
        match self {
            TypedStorage::Bool(_) => DType::Bool,
            TypedStorage::Uint8(_) => DType::Uint8,
            TypedStorage::Int32(_) => DType::Int32,
            TypedStorage::Int64(_) => DType::Int64,
            TypedStorage::Float32(_) => DType::Float32,
            TypedStorage::Float64(_) => DType::Float64,
            TypedStorage::Complex64(_) => DType::Complex64,
            TypedStorage::Complex128(_) => DType::Complex128,
        }
    }

    pub fn global_shape(&self) -> &[usize] {
        dispatch!(self, s => s.global_shape())
    }

    pub fn local_shape(&self) -> &[usize] {
        dispatch!(self, s => s.local_shape())
    }

    pub fn distributed_axis(&self) -> Option<usize> {
        dispatch!(self, s => s.distributed_axis())
    }

    pub fn local_offset(&self) -> usize {
        dispatch!(self, s => s.local_offset())
    }

    pub fn select(&self, axis: usize, indices: &[usize]) -> Result<TypedStorage, DistributedError> {
        Ok(map_storage!(self, s => s.select(axis, indices)?))
    }

    pub fn redistribute(&self, axis: usize) -> Result<TypedStorage, DistributedError> {
        Ok(map_storage!(self, s => s.redistribute(axis)?))
    }

    /// Join `parts` along `axis`. `None` if the parts have different element
    /// types or there are none.
    pub fn concatenate(
        axis: usize,
        parts: &[&TypedStorage],
    ) -> Option<Result<TypedStorage, DistributedError>> {
        let dtype = parts.first()?.dtype();
        with_dtype!(dtype, T => {
            let typed: Vec<&Storage<T>> = parts
                .iter()
                .map(|p| T::unwrap_ref(p))
                .collect::<Option<_>>()?;
            Some(Storage::concatenate(axis, &typed).map(T::wrap))
        })
    }
}
