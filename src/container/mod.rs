//! Containers: axes, datasets bound to them, and attributes, all checked
//! against a container type's schema.
//!
//! Every container type is a [`ContainerSchema`] (see [`types`] for the
//! built-in ones); one engine implements creation, selection, redistribution,
//! concatenation and persistence for all of them.
//!
//! Datasets are held behind `Arc`s. Operations that leave a dataset alone
//! (e.g. a selection along an axis it isn't bound to) pass the `Arc` on rather
//! than copying the data, and anything that mutates a dataset clones it first
//! if it's shared, so containers never see each other's changes.

mod builder;
mod io;
pub mod schema;
pub mod types;

pub use builder::ContainerBuilder;
pub use io::LoadOptions;
pub use schema::{ContainerSchema, SchemaRegistry};

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};

use crate::{
    attrs::Attributes,
    axis::{Axis, Selection},
    comm::Communicator,
    dataset::{Dataset, DatasetSpec, Storage, TypedStorage},
    element::Element,
    error::{ContainerError, SchemaError},
};

#[derive(Debug, Clone)]
pub struct Container {
    schema: Arc<ContainerSchema>,
    axes: IndexMap<String, Arc<Axis>>,
    datasets: IndexMap<String, Arc<Dataset>>,
    attrs: Attributes,
    comm: Arc<dyn Communicator>,
    /// Are distributable datasets split over the workers?
    distributed: bool,
}

impl Container {
    /// Start building a container of a registered type.
    pub fn builder(container_type: &str) -> Result<ContainerBuilder, SchemaError> {
        Ok(ContainerBuilder::new(schema::lookup(container_type)?))
    }

    /// A new container of the same type sharing `source`'s axes, with zeroed
    /// datasets. `datasets` picks which ones; by default every dataset the
    /// axes allow is created. No data or attributes are copied.
    pub fn like(source: &Container, datasets: Option<&[&str]>) -> Result<Container, ContainerError> {
        let mut builder = ContainerBuilder::new(Arc::clone(&source.schema))
            .axes_from(source)
            .distributed(source.distributed)
            .comm(Arc::clone(&source.comm))
            .partial();
        if let Some(datasets) = datasets {
            builder = builder.datasets(datasets);
        }
        builder.build()
    }

    pub fn container_type(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<ContainerSchema> {
        &self.schema
    }

    pub fn comm(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    pub fn is_distributed(&self) -> bool {
        self.distributed
    }

    /// The axes, in the order the container type declares them.
    pub fn axes(&self) -> impl Iterator<Item = &Axis> {
        self.axes.values().map(|a| a.as_ref())
    }

    pub fn axis(&self, name: &str) -> Result<&Axis, ContainerError> {
        self.axes
            .get(name)
            .map(|a| a.as_ref())
            .ok_or_else(|| ContainerError::AxisAbsent {
                axis: name.to_string(),
            })
    }

    pub fn has_axis(&self, name: &str) -> bool {
        self.axes.contains_key(name)
    }

    pub(crate) fn shared_axes(&self) -> &IndexMap<String, Arc<Axis>> {
        &self.axes
    }

    pub fn datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values().map(|d| d.as_ref())
    }

    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.keys().map(|k| k.as_str()).collect()
    }

    pub fn has_dataset(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    fn check_declared(&self, name: &str) -> Result<&DatasetSpec, ContainerError> {
        self.schema
            .dataset(name)
            .ok_or_else(|| ContainerError::UnknownDataset {
                container_type: self.schema.name().to_string(),
                dataset: name.to_string(),
            })
    }

    pub fn dataset(&self, name: &str) -> Result<&Dataset, ContainerError> {
        self.check_declared(name)?;
        self.datasets
            .get(name)
            .map(|d| d.as_ref())
            .ok_or_else(|| ContainerError::DatasetAbsent {
                dataset: name.to_string(),
            })
    }

    /// Mutable access to a dataset. If the dataset is shared with another
    /// container, this container gets its own copy first.
    pub fn dataset_mut(&mut self, name: &str) -> Result<&mut Dataset, ContainerError> {
        self.check_declared(name)?;
        self.datasets
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| ContainerError::DatasetAbsent {
                dataset: name.to_string(),
            })
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub fn array<T: Element>(&self, name: &str) -> Result<&Storage<T>, ContainerError> {
        self.dataset(name)?.array()
    }

    /// This worker's part of a dataset.
    pub fn local<T: Element>(&self, name: &str) -> Result<ArrayViewD<T>, ContainerError> {
        self.dataset(name)?.local()
    }

    pub fn local_mut<T: Element>(&mut self, name: &str) -> Result<ArrayViewMutD<T>, ContainerError> {
        self.dataset_mut(name)?.local_mut()
    }

    pub fn assign_local<T: Element>(
        &mut self,
        name: &str,
        values: ArrayViewD<T>,
    ) -> Result<(), ContainerError> {
        self.dataset_mut(name)?.assign_local(values)
    }

    /// A whole dataset on every worker. Collective for distributed datasets.
    pub fn to_full<T: Element>(&self, name: &str) -> Result<ArrayD<T>, ContainerError> {
        self.dataset(name)?.to_full()
    }

    /// The shape a dataset must have in this container.
    fn shape_for(&self, spec: &DatasetSpec) -> Result<Vec<usize>, ContainerError> {
        dataset_shape(&self.axes, spec)
    }

    fn initial_distributed_axis(&self, spec: &DatasetSpec) -> Option<usize> {
        (spec.distributed && self.distributed).then_some(0)
    }

    /// Create a zero-filled dataset declared by the container type.
    pub fn add_dataset(&mut self, name: &str) -> Result<&mut Dataset, ContainerError> {
        let spec = self.check_declared(name)?.clone();
        if self.datasets.contains_key(name) {
            return Err(SchemaError::DuplicateDataset {
                dataset: name.to_string(),
            }
            .into());
        }
        let shape = self.shape_for(&spec)?;
        let dataset = Dataset::zeros(
            &spec,
            shape,
            self.initial_distributed_axis(&spec),
            &self.comm,
        )?;
        debug!("Added dataset '{name}' to a {}", self.schema.name());
        let dataset = self
            .datasets
            .entry(name.to_string())
            .or_insert(Arc::new(dataset));
        Ok(Arc::make_mut(dataset))
    }

    /// A new container with `axis` trimmed to `selection`. Datasets bound to
    /// the axis are sliced in the order of the selection; the others are
    /// shared with this container. Collective if a dataset is split along the
    /// axis.
    pub fn select<S: Into<Selection>>(
        &self,
        axis: &str,
        selection: S,
    ) -> Result<Container, ContainerError> {
        let old_axis = self.axis(axis)?;
        let indices = old_axis.resolve(&selection.into())?;
        let new_axis = Arc::new(old_axis.select(&indices)?);

        let mut datasets = IndexMap::with_capacity(self.datasets.len());
        for (name, dataset) in &self.datasets {
            let dataset = match dataset.axis_index(axis) {
                Some(i) => Arc::new(dataset.select(i, &indices)?),
                None => Arc::clone(dataset),
            };
            datasets.insert(name.clone(), dataset);
        }
        let mut axes = self.axes.clone();
        axes.insert(axis.to_string(), new_axis);

        let container = Container {
            schema: Arc::clone(&self.schema),
            axes,
            datasets,
            attrs: self.attrs.clone(),
            comm: Arc::clone(&self.comm),
            distributed: self.distributed,
        };
        container.validate()?;
        Ok(container)
    }

    /// Split every distributed dataset bound to `axis` along that axis.
    /// Collective.
    pub fn redistribute(&mut self, axis: &str) -> Result<(), ContainerError> {
        if !self.axes.contains_key(axis) {
            return Err(ContainerError::AxisAbsent {
                axis: axis.to_string(),
            });
        }
        for dataset in self.datasets.values_mut() {
            let (current, target) = match (dataset.distributed_axis(), dataset.axis_index(axis)) {
                (Some(current), Some(target)) => (current, target),
                _ => continue,
            };
            if current != target {
                debug!("Redistributing '{}' over '{axis}'", dataset.name());
                *dataset = Arc::new(dataset.redistribute(target)?);
            }
        }
        self.validate()?;
        Ok(())
    }

    /// A copy of this container. Data is only copied when one of the two is
    /// modified.
    pub fn copy(&self) -> Container {
        self.clone()
    }

    /// Join containers of the same type end to end along `axis`. Every other
    /// axis must be compatible. Datasets bound to `axis` are concatenated; the
    /// others are taken from the first container. Datasets missing from any
    /// container are dropped. Collective if any dataset is distributed.
    pub fn concatenate(containers: &[&Container], axis: &str) -> Result<Container, ContainerError> {
        let (first, rest) = containers
            .split_first()
            .ok_or(SchemaError::NothingToConcatenate)?;
        for other in rest {
            if other.schema.name() != first.schema.name() {
                return Err(SchemaError::IncompatibleContainerTypes {
                    a: first.schema.name().to_string(),
                    b: other.schema.name().to_string(),
                }
                .into());
            }
        }

        let mut axes = first.axes.clone();
        let mut joined = first.axis(axis)?.clone();
        for other in rest {
            joined = joined.concat(other.axis(axis)?)?;
            for (name, a) in &first.axes {
                if name == axis {
                    continue;
                }
                let compatible = other.axes.get(name).map(|b| a.is_compatible(b));
                if compatible != Some(true) {
                    return Err(SchemaError::IncompatibleAxis { axis: name.clone() }.into());
                }
            }
        }
        axes.insert(axis.to_string(), Arc::new(joined));

        let mut datasets = IndexMap::new();
        for (name, dataset) in &first.datasets {
            let parts: Option<Vec<&Dataset>> = containers
                .iter()
                .map(|c| c.datasets.get(name).map(|d| d.as_ref()))
                .collect();
            let parts = match parts {
                Some(parts) => parts,
                None => {
                    warn!("Dataset '{name}' isn't in every container; dropping it");
                    continue;
                }
            };
            let dataset = match dataset.axis_index(axis) {
                Some(i) => {
                    let storages = parts
                        .iter()
                        .map(|d| d.storage())
                        .collect::<Result<Vec<_>, _>>()?;
                    let storage = TypedStorage::concatenate(i, &storages).ok_or_else(|| {
                        SchemaError::DTypeMismatch {
                            dataset: name.clone(),
                            expected: dataset.dtype(),
                            actual: storages
                                .iter()
                                .map(|s| s.dtype())
                                .find(|&t| t != dataset.dtype())
                                .unwrap_or(dataset.dtype()),
                        }
                    })??;
                    Arc::new(
                        Dataset::resident(name, dataset.axes().to_vec(), storage)
                            .with_attrs(dataset.attrs().clone()),
                    )
                }
                None => Arc::clone(dataset),
            };
            datasets.insert(name.clone(), dataset);
        }

        let container = Container {
            schema: Arc::clone(&first.schema),
            axes,
            datasets,
            attrs: first.attrs.clone(),
            comm: Arc::clone(&first.comm),
            distributed: first.distributed,
        };
        container.validate()?;
        Ok(container)
    }

    /// Check that every dataset agrees with its declaration and the axes.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (name, dataset) in &self.datasets {
            // Only declared datasets are ever added.
            if let Some(spec) = self.schema.dataset(name) {
                dataset.validate(spec, &self.axes)?;
            }
        }
        Ok(())
    }

    /// Check that the container is complete: it is valid and every required
    /// dataset is present. Containers built with
    /// [`ContainerBuilder::partial`] should be finalised once all of their
    /// datasets have been added.
    pub fn finalise(&self) -> Result<(), SchemaError> {
        self.validate()?;
        for spec in self.schema.datasets().iter().filter(|s| s.required) {
            if !self.datasets.contains_key(&spec.name) {
                return Err(SchemaError::MissingRequiredDataset {
                    container_type: self.schema.name().to_string(),
                    dataset: spec.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The shape of a dataset bound to `spec.axes`.
fn dataset_shape(
    axes: &IndexMap<String, Arc<Axis>>,
    spec: &DatasetSpec,
) -> Result<Vec<usize>, ContainerError> {
    spec.axes
        .iter()
        .map(|name| {
            axes.get(name)
                .map(|a| a.len())
                .ok_or_else(|| ContainerError::MissingAxis {
                    dataset: spec.name.clone(),
                    axis: name.clone(),
                })
        })
        .collect()
}
