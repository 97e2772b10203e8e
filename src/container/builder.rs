use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};

use super::{dataset_shape, Container, ContainerSchema};
use crate::{
    attrs::Attributes,
    axis::{Axis, AxisDef},
    comm::{Communicator, SelfComm},
    dataset::{Dataset, DatasetSpec},
    error::{ContainerError, SchemaError},
};

/// Creates containers from scratch, or from the axes of other containers.
///
/// ```
/// use pipedata::container::Container;
///
/// let ts = Container::builder("RFIMask")?
///     .axis("freq", vec![800.0, 790.0, 780.0])?
///     .axis("time", 10)?
///     .build()?;
/// assert_eq!(ts.local::<bool>("mask")?.shape(), &[3, 10]);
/// # Ok::<(), pipedata::ContainerError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    schema: Arc<ContainerSchema>,
    /// Explicitly defined axes. These win over `axes_from`.
    axes: IndexMap<String, Arc<Axis>>,
    axes_from: IndexMap<String, Arc<Axis>>,
    /// Axes not to take from `axes_from`.
    without: Vec<String>,
    attrs: Attributes,
    dataset_attrs: IndexMap<String, Attributes>,
    datasets: Option<Vec<String>>,
    distributed: bool,
    comm: Arc<dyn Communicator>,
    partial: bool,
}

impl ContainerBuilder {
    pub fn new(schema: Arc<ContainerSchema>) -> ContainerBuilder {
        ContainerBuilder {
            schema,
            axes: IndexMap::new(),
            axes_from: IndexMap::new(),
            without: vec![],
            attrs: Attributes::new(),
            dataset_attrs: IndexMap::new(),
            datasets: None,
            distributed: true,
            comm: SelfComm::new_arc(),
            partial: false,
        }
    }

    /// Define an axis from a length or labels.
    pub fn axis<D: Into<AxisDef>>(self, name: &str, def: D) -> Result<Self, SchemaError> {
        Ok(self.with_axis(Axis::define(name, def)?))
    }

    /// Use an axis that has already been defined.
    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axes.insert(axis.name().to_string(), Arc::new(axis));
        self
    }

    /// Share the axes of `source`, which may be of another type. Only the
    /// axes this type declares are used.
    pub fn axes_from(mut self, source: &Container) -> Self {
        self.axes_from = source.shared_axes().clone();
        self
    }

    /// Don't take the named axis from [`ContainerBuilder::axes_from`], so the
    /// datasets bound to it aren't created.
    pub fn without_axis(mut self, name: &str) -> Self {
        self.without.push(name.to_string());
        self
    }

    /// Copy `source`'s attributes, and the attributes of its datasets onto the
    /// datasets of the same name.
    pub fn attrs_from(mut self, source: &Container) -> Self {
        self.attrs = source.attrs().clone();
        self.dataset_attrs = source
            .datasets()
            .map(|d| (d.name().to_string(), d.attrs().clone()))
            .collect();
        self
    }

    /// Only create these datasets.
    pub fn datasets(mut self, names: &[&str]) -> Self {
        self.datasets = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Split distributable datasets over the workers (the default)?
    pub fn distributed(mut self, distributed: bool) -> Self {
        self.distributed = distributed;
        self
    }

    /// The workers the container lives on. A group of one by default.
    pub fn comm(mut self, comm: Arc<dyn Communicator>) -> Self {
        self.comm = comm;
        self
    }

    /// Don't require every required dataset to be present; call
    /// [`Container::finalise`] once they've all been added.
    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn build(self) -> Result<Container, ContainerError> {
        for name in self.axes.keys() {
            if !self.schema.declares_axis(name) {
                warn!(
                    "Container type {} has no axis '{name}'; ignoring it",
                    self.schema.name()
                );
            }
        }

        let mut axes = IndexMap::new();
        for name in self.schema.axes() {
            let axis = self.axes.get(name).or_else(|| {
                if self.without.contains(name) {
                    None
                } else {
                    self.axes_from.get(name)
                }
            });
            if let Some(axis) = axis {
                axes.insert(name.clone(), Arc::clone(axis));
            }
        }

        let specs: Vec<&DatasetSpec> = match &self.datasets {
            Some(names) => names
                .iter()
                .map(|name| {
                    let spec = self.schema.dataset(name).ok_or_else(|| {
                        ContainerError::UnknownDataset {
                            container_type: self.schema.name().to_string(),
                            dataset: name.clone(),
                        }
                    })?;
                    dataset_shape(&axes, spec)?;
                    Ok(spec)
                })
                .collect::<Result<_, ContainerError>>()?,
            None => self
                .schema
                .datasets()
                .iter()
                .filter(|spec| spec.axes.iter().all(|a| axes.contains_key(a)))
                .collect(),
        };

        let mut datasets = IndexMap::new();
        for spec in specs {
            let shape = dataset_shape(&axes, spec)?;
            let distributed_axis = (spec.distributed && self.distributed).then_some(0);
            let mut dataset = Dataset::zeros(spec, shape, distributed_axis, &self.comm)?;
            if let Some(attrs) = self.dataset_attrs.get(&spec.name) {
                *dataset.attrs_mut() = attrs.clone();
            }
            datasets.insert(spec.name.clone(), Arc::new(dataset));
        }
        debug!(
            "Created a {} with axes [{}] and datasets {:?}",
            self.schema.name(),
            axes.values().map(|a| a.to_string()).collect::<Vec<_>>().join("; "),
            datasets.keys().collect::<Vec<_>>()
        );

        let container = Container {
            schema: self.schema,
            axes,
            datasets,
            attrs: self.attrs,
            comm: self.comm,
            distributed: self.distributed,
        };
        if self.partial {
            container.validate()?;
        } else {
            container.finalise()?;
        }
        Ok(container)
    }
}
