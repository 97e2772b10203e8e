//! Datasets: named arrays bound to a tuple of axes.
//!
//! A [`DatasetSpec`] is a container type's declaration of a dataset. A
//! [`Dataset`] is the data itself, held either *resident* (in memory, local or
//! distributed) or *deferred* (a description of where to read it from). A
//! deferred dataset is read the first time its data is needed and kept from
//! then on.

mod storage;

pub(crate) use storage::dispatch;
pub use storage::{Storage, TypedStorage};

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use log::debug;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};

use crate::{
    attrs::Attributes,
    axis::Axis,
    comm::Communicator,
    distributed::{partition, DistributedArray},
    element::{with_dtype, DType, Element},
    error::{ContainerError, SchemaError},
    store::{Hyperslab, Store},
};

/// The declaration of a dataset by a container type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub name: String,
    /// The axes the dataset is bound to, in order.
    pub axes: Vec<String>,
    pub dtype: DType,
    /// Can the dataset be split over workers?
    pub distributed: bool,
    /// Must the dataset be present in a complete container?
    pub required: bool,
}

impl DatasetSpec {
    pub fn new(name: &str, axes: &[&str], dtype: DType) -> DatasetSpec {
        DatasetSpec {
            name: name.to_string(),
            axes: axes.iter().map(|a| a.to_string()).collect(),
            dtype,
            distributed: false,
            required: false,
        }
    }

    pub fn distributed(mut self) -> DatasetSpec {
        self.distributed = true;
        self
    }

    pub fn required(mut self) -> DatasetSpec {
        self.required = true;
        self
    }
}

/// Where a deferred dataset's data is.
#[derive(Debug, Clone)]
pub struct DeferredRead {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) group: String,
    /// The name in the store.
    pub(crate) name: String,
    /// Split the data along this axis when it's read.
    pub(crate) distributed_axis: Option<usize>,
    pub(crate) comm: Arc<dyn Communicator>,
}

impl DeferredRead {
    /// Read this worker's part. Not collective; each worker reads only its own
    /// chunk.
    fn read(&self, dtype: DType, shape: &[usize]) -> Result<TypedStorage, ContainerError> {
        let path = crate::store::dataset_path(&self.group, &self.name);
        debug!("Reading {path}");
        let slab = self.distributed_axis.map(|axis| Hyperslab {
            axis,
            range: partition::local_range(shape[axis], self.comm.size(), self.comm.rank()),
        });
        let chunk = self.store.read_dataset(&self.group, &self.name, slab.as_ref())?;
        with_dtype!(dtype, T => {
            let local = chunk.into_array::<T>(&path)?;
            let storage = match self.distributed_axis {
                Some(axis) => Storage::Distributed(DistributedArray::from_local_parts(
                    shape.to_vec(),
                    axis,
                    local,
                    Arc::clone(&self.comm),
                )?),
                None => Storage::Local(local),
            };
            Ok(T::wrap(storage))
        })
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    axes: Vec<String>,
    dtype: DType,
    shape: Vec<usize>,
    distributed_axis: Option<usize>,
    attrs: Attributes,
    data: OnceLock<TypedStorage>,
    deferred: Option<DeferredRead>,
}

impl Dataset {
    /// A zero-filled dataset.
    pub(crate) fn zeros(
        spec: &DatasetSpec,
        shape: Vec<usize>,
        distributed_axis: Option<usize>,
        comm: &Arc<dyn Communicator>,
    ) -> Result<Dataset, ContainerError> {
        let storage = TypedStorage::zeros(spec.dtype, &shape, distributed_axis, comm)?;
        Ok(Dataset::resident(&spec.name, spec.axes.clone(), storage))
    }

    pub(crate) fn resident(name: &str, axes: Vec<String>, storage: TypedStorage) -> Dataset {
        Dataset {
            name: name.to_string(),
            axes,
            dtype: storage.dtype(),
            shape: storage.global_shape().to_vec(),
            distributed_axis: storage.distributed_axis(),
            attrs: Attributes::new(),
            data: OnceLock::from(storage),
            deferred: None,
        }
    }

    pub(crate) fn deferred(
        name: &str,
        axes: Vec<String>,
        dtype: DType,
        shape: Vec<usize>,
        read: DeferredRead,
    ) -> Dataset {
        Dataset {
            name: name.to_string(),
            axes,
            dtype,
            shape,
            distributed_axis: read.distributed_axis,
            attrs: Attributes::new(),
            data: OnceLock::new(),
            deferred: Some(read),
        }
    }

    pub(crate) fn with_attrs(mut self, attrs: Attributes) -> Dataset {
        self.attrs = attrs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The global shape. Available without reading deferred data.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The index of the axis the data is split along, if it's distributed.
    pub fn distributed_axis(&self) -> Option<usize> {
        self.distributed_axis
    }

    /// The position of `axis` in this dataset's axes.
    pub fn axis_index(&self, axis: &str) -> Option<usize> {
        self.axes.iter().position(|a| a == axis)
    }

    /// Has the data been read (or was it never deferred)?
    pub fn is_resident(&self) -> bool {
        self.data.get().is_some()
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    fn read_deferred(&self) -> Result<TypedStorage, ContainerError> {
        let read = self
            .deferred
            .as_ref()
            .ok_or_else(|| ContainerError::DatasetAbsent {
                dataset: self.name.clone(),
            })?;
        read.read(self.dtype, &self.shape)
    }

    /// The data, reading it first if it's deferred.
    pub fn storage(&self) -> Result<&TypedStorage, ContainerError> {
        if let Some(storage) = self.data.get() {
            return Ok(storage);
        }
        let loaded = self.read_deferred()?;
        Ok(self.data.get_or_init(|| loaded))
    }

    pub(crate) fn storage_mut(&mut self) -> Result<&mut TypedStorage, ContainerError> {
        if self.data.get().is_none() {
            let loaded = self.read_deferred()?;
            let _ = self.data.set(loaded);
        }
        self.data
            .get_mut()
            .ok_or_else(|| ContainerError::DatasetAbsent {
                dataset: self.name.clone(),
            })
    }

    /// Read deferred data now.
    pub fn materialise(&self) -> Result<(), ContainerError> {
        self.storage().map(|_| ())
    }

    fn dtype_mismatch<T: Element>(&self) -> ContainerError {
        ContainerError::Schema(SchemaError::DTypeMismatch {
            dataset: self.name.clone(),
            expected: self.dtype,
            actual: T::DTYPE,
        })
    }

    /// The data as its element type.
    pub fn array<T: Element>(&self) -> Result<&Storage<T>, ContainerError> {
        let storage = self.storage()?;
        T::unwrap_ref(storage).ok_or_else(|| self.dtype_mismatch::<T>())
    }

    fn array_mut<T: Element>(&mut self) -> Result<&mut Storage<T>, ContainerError> {
        if T::DTYPE != self.dtype {
            return Err(self.dtype_mismatch::<T>());
        }
        let name = self.name.clone();
        T::unwrap_mut(self.storage_mut()?).ok_or(ContainerError::DatasetAbsent { dataset: name })
    }

    /// This worker's part of the data.
    pub fn local<T: Element>(&self) -> Result<ArrayViewD<T>, ContainerError> {
        Ok(self.array::<T>()?.local())
    }

    pub fn local_mut<T: Element>(&mut self) -> Result<ArrayViewMutD<T>, ContainerError> {
        Ok(self.array_mut::<T>()?.local_mut())
    }

    /// The shape of this worker's part.
    pub fn local_shape(&self) -> Result<&[usize], ContainerError> {
        Ok(self.storage()?.local_shape())
    }

    /// Overwrite this worker's part. `values` must have the shape of the local
    /// part exactly.
    pub fn assign_local<T: Element>(&mut self, values: ArrayViewD<T>) -> Result<(), ContainerError> {
        let name = self.name.clone();
        let mut local = self.local_mut::<T>()?;
        if local.shape() != values.shape() {
            return Err(SchemaError::DimensionMismatch {
                dataset: name,
                expected: local.shape().to_vec(),
                actual: values.shape().to_vec(),
            }
            .into());
        }
        local.assign(&values);
        Ok(())
    }

    /// The whole array on every worker. Collective for distributed data.
    pub fn to_full<T: Element>(&self) -> Result<ArrayD<T>, ContainerError> {
        Ok(self.array::<T>()?.to_full()?)
    }

    /// Keep the elements at `indices` along this dataset's axis `axis`.
    /// Collective if the data is split along that axis.
    pub(crate) fn select(&self, axis: usize, indices: &[usize]) -> Result<Dataset, ContainerError> {
        let storage = self.storage()?.select(axis, indices)?;
        Ok(Dataset::resident(&self.name, self.axes.clone(), storage).with_attrs(self.attrs.clone()))
    }

    /// Split the data along this dataset's axis `axis` instead. Collective.
    pub(crate) fn redistribute(&self, axis: usize) -> Result<Dataset, ContainerError> {
        let storage = self.storage()?.redistribute(axis)?;
        Ok(Dataset::resident(&self.name, self.axes.clone(), storage).with_attrs(self.attrs.clone()))
    }

    /// Check the dataset against its declaration and the container's axes.
    pub(crate) fn validate(
        &self,
        spec: &DatasetSpec,
        axes: &IndexMap<String, Arc<Axis>>,
    ) -> Result<(), SchemaError> {
        if self.dtype != spec.dtype {
            return Err(SchemaError::DTypeMismatch {
                dataset: self.name.clone(),
                expected: spec.dtype,
                actual: self.dtype,
            });
        }
        if self.axes != spec.axes || self.shape.len() != self.axes.len() {
            return Err(SchemaError::DimensionMismatch {
                dataset: self.name.clone(),
                expected: spec
                    .axes
                    .iter()
                    .map(|a| axes.get(a).map(|a| a.len()).unwrap_or(0))
                    .collect(),
                actual: self.shape.clone(),
            });
        }
        for (axis_name, &len) in self.axes.iter().zip(&self.shape) {
            let axis = axes
                .get(axis_name)
                .ok_or_else(|| SchemaError::DatasetAxisMissing {
                    dataset: self.name.clone(),
                    axis: axis_name.clone(),
                })?;
            if axis.len() != len {
                return Err(SchemaError::ShapeMismatch {
                    dataset: self.name.clone(),
                    axis: axis_name.clone(),
                    expected: axis.len(),
                    actual: len,
                });
            }
        }
        Ok(())
    }
}
