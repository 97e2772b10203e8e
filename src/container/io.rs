//! Saving containers to, and loading them from, a [`Store`].
//!
//! A container is a group. The group's attributes are the container's, plus
//! its type tag. The `index_map` subgroup has one attribute per axis (its
//! labels, or its length). Every dataset records the names of its axes and, if
//! it was distributed, the axis it was split along. Loading recomputes the
//! chunk boundaries for however many workers are loading, so a container saved
//! by N workers can be loaded by M.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use super::{schema, Container};
use crate::{
    attrs::AttrValue,
    axis::Axis,
    comm::{self, Communicator},
    dataset::{dispatch, Dataset, DeferredRead, TypedStorage},
    error::{ContainerError, SchemaError},
    store::{self, AttrTarget, DatasetInfo, RawChunk, Store},
};

const CONTAINER_TYPE_ATTR: &str = "__container_type__";
const DISTRIBUTED_AXIS_ATTR: &str = "__distributed_axis__";
const AXIS_ATTR: &str = "axis";
const INDEX_MAP_GROUP: &str = "index_map";

/// How to load a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Split distributable datasets over the workers.
    pub distributed: bool,

    /// Only read dataset metadata now; read the data on first access.
    pub lazy: bool,

    /// Only load these datasets. All of them if `None`.
    pub datasets: Option<Vec<String>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            distributed: true,
            lazy: false,
            datasets: None,
        }
    }
}

/// Make every worker fail if any worker did.
fn agree(comm: &dyn Communicator, result: Result<(), ContainerError>) -> Result<(), ContainerError> {
    let ok = comm::all_gather(comm, result.is_ok())?;
    result?;
    match ok.iter().position(|ok| !ok) {
        Some(rank) => Err(ContainerError::PeerFailed { rank }),
        None => Ok(()),
    }
}

impl Container {
    /// Write the container into `group` of `store`. Collective: worker 0
    /// writes the metadata, then every worker writes its own part of each
    /// distributed dataset. Whatever `group` held before is removed first.
    /// Nothing is rolled back on failure.
    pub fn save(&self, store: &dyn Store, group: &str) -> Result<(), ContainerError> {
        let comm = &*self.comm;
        debug!(
            "Rank {}: saving a {} to '{}'",
            comm.rank(),
            self.container_type(),
            store::normalise(group)
        );

        // Deferred data must be read before its source can be overwritten.
        let result = self.datasets().try_for_each(|d| d.materialise());
        agree(comm, result)?;

        let result = if comm.rank() == 0 {
            self.write_metadata(store, group)
        } else {
            Ok(())
        };
        agree(comm, result)?;

        let result = self.write_chunks(store, group);
        agree(comm, result)
    }

    fn write_metadata(&self, store: &dyn Store, group: &str) -> Result<(), ContainerError> {
        store.remove_group(group)?;
        store.create_group(group)?;
        let target = AttrTarget::Group(group);
        for (key, value) in self.attrs() {
            store.write_attribute(target, key, value)?;
        }
        store.write_attribute(
            target,
            CONTAINER_TYPE_ATTR,
            &AttrValue::from(self.container_type()),
        )?;

        let index_map = store::join(group, INDEX_MAP_GROUP);
        store.create_group(&index_map)?;
        for axis in self.axes() {
            store.write_attribute(AttrTarget::Group(&index_map), axis.name(), &axis.to_attr())?;
        }

        for dataset in self.datasets() {
            let mut attrs = dataset.attrs().clone();
            attrs.insert(
                AXIS_ATTR.to_string(),
                AttrValue::StrArray(dataset.axes().to_vec()),
            );
            if let Some(axis) = dataset.distributed_axis() {
                attrs.insert(DISTRIBUTED_AXIS_ATTR.to_string(), AttrValue::Int(axis as i64));
            }
            let info = DatasetInfo {
                dtype: dataset.dtype(),
                shape: dataset.shape().to_vec(),
                attrs,
            };
            store.create_dataset(group, dataset.name(), &info)?;
        }
        Ok(())
    }

    fn write_chunks(&self, store: &dyn Store, group: &str) -> Result<(), ContainerError> {
        let rank = self.comm.rank();
        for dataset in self.datasets() {
            let storage = dataset.storage()?;
            // Undistributed data is the same everywhere; worker 0 writes it.
            let axis = match storage.distributed_axis() {
                Some(axis) => axis,
                None if rank == 0 => 0,
                None => continue,
            };
            let offset = storage.local_offset();
            let chunk = dispatch!(storage, s => RawChunk::from_array(s.local()));
            trace!(
                "Rank {rank}: writing {:?} of '{}' at {offset} along axis {axis}",
                chunk.shape,
                dataset.name()
            );
            store.write_dataset(group, dataset.name(), &chunk, axis, offset)?;
        }
        Ok(())
    }

    /// Read a container from `group` of `store`. Each worker reads only what
    /// it needs, so this isn't collective.
    pub fn load(
        store: Arc<dyn Store>,
        group: &str,
        options: &LoadOptions,
        comm: Arc<dyn Communicator>,
    ) -> Result<Container, ContainerError> {
        let group = store::normalise(group);
        store.open_group(&group)?;
        let mut attrs = store.read_attributes(AttrTarget::Group(&group))?;
        let container_type = attrs
            .shift_remove(CONTAINER_TYPE_ATTR)
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| ContainerError::NotAContainer {
                group: group.clone(),
            })?;
        let schema = schema::lookup(&container_type)?;
        debug!(
            "Rank {}: loading a {container_type} from '{group}'",
            comm.rank()
        );

        let index_map = store.read_attributes(AttrTarget::Group(&store::join(
            &group,
            INDEX_MAP_GROUP,
        )))?;
        for name in index_map.keys() {
            if !schema.declares_axis(name) {
                warn!("Ignoring axis '{name}', which a {container_type} doesn't have");
            }
        }
        let mut axes = IndexMap::new();
        for name in schema.axes() {
            if let Some(value) = index_map.get(name) {
                axes.insert(name.clone(), Arc::new(Axis::from_attr(name.as_str(), value)?));
            }
        }

        let stored = store.list_datasets(&group)?;
        for name in &stored {
            if schema.dataset(name).is_none() {
                warn!("Ignoring dataset '{name}', which a {container_type} doesn't have");
            }
        }
        if let Some(wanted) = &options.datasets {
            for name in wanted {
                if schema.dataset(name).is_none() {
                    return Err(ContainerError::UnknownDataset {
                        container_type,
                        dataset: name.clone(),
                    });
                }
                if !stored.contains(name) {
                    return Err(ContainerError::DatasetAbsent {
                        dataset: name.clone(),
                    });
                }
            }
        }

        let mut datasets = IndexMap::new();
        for spec in schema.datasets() {
            let wanted = options
                .datasets
                .as_ref()
                .map_or(true, |names| names.contains(&spec.name));
            if !wanted || !stored.contains(&spec.name) {
                continue;
            }

            let mut info = store.dataset_info(&group, &spec.name)?;
            let stored_axes = info
                .attrs
                .shift_remove(AXIS_ATTR)
                .and_then(|v| v.as_str_array().map(<[String]>::to_vec))
                .unwrap_or_else(|| spec.axes.clone());
            if stored_axes != spec.axes {
                return Err(SchemaError::DatasetAxesMismatch {
                    dataset: spec.name.clone(),
                    expected: spec.axes.clone(),
                    actual: stored_axes,
                }
                .into());
            }
            if info.dtype != spec.dtype {
                return Err(SchemaError::DTypeMismatch {
                    dataset: spec.name.clone(),
                    expected: spec.dtype,
                    actual: info.dtype,
                }
                .into());
            }
            let saved_axis = info
                .attrs
                .shift_remove(DISTRIBUTED_AXIS_ATTR)
                .and_then(|v| v.as_int())
                .and_then(|a| usize::try_from(a).ok())
                .filter(|&a| a < info.shape.len());
            let distributed_axis =
                (options.distributed && spec.distributed).then(|| saved_axis.unwrap_or(0));

            let read = DeferredRead {
                store: Arc::clone(&store),
                group: group.clone(),
                name: spec.name.clone(),
                distributed_axis,
                comm: Arc::clone(&comm),
            };
            let dataset = Dataset::deferred(&spec.name, spec.axes.clone(), info.dtype, info.shape, read)
                .with_attrs(info.attrs);
            if !options.lazy {
                dataset.materialise()?;
            }
            datasets.insert(spec.name.clone(), Arc::new(dataset));
        }

        let container = Container {
            schema,
            axes,
            datasets,
            attrs,
            comm,
            distributed: options.distributed,
        };
        container.validate()?;
        Ok(container)
    }
}
