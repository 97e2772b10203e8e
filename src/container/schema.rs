//! Container types as data: a type is a name, its axes and its dataset table.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use log::debug;

use super::types;
use crate::{dataset::DatasetSpec, error::SchemaError};

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSchema {
    name: String,
    axes: Vec<String>,
    datasets: Vec<DatasetSpec>,
}

impl ContainerSchema {
    /// Declare a container type. Every dataset must be bound only to declared
    /// axes, each at most once, and names can't repeat.
    pub fn new(
        name: &str,
        axes: &[&str],
        datasets: Vec<DatasetSpec>,
    ) -> Result<ContainerSchema, SchemaError> {
        let schema = ContainerSchema::new_unchecked(name, axes, datasets);
        schema.validate()?;
        Ok(schema)
    }

    /// For the built-in table, which is checked by the tests instead.
    pub(super) fn new_unchecked(
        name: &str,
        axes: &[&str],
        datasets: Vec<DatasetSpec>,
    ) -> ContainerSchema {
        ContainerSchema {
            name: name.to_string(),
            axes: axes.iter().map(|a| a.to_string()).collect(),
            datasets,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[..i].contains(axis) {
                return Err(SchemaError::DuplicateAxis {
                    container_type: self.name.clone(),
                    axis: axis.clone(),
                });
            }
        }
        for (i, spec) in self.datasets.iter().enumerate() {
            if self.datasets[..i].iter().any(|s| s.name == spec.name) {
                return Err(SchemaError::DuplicateDatasetSpec {
                    container_type: self.name.clone(),
                    dataset: spec.name.clone(),
                });
            }
            for (j, axis) in spec.axes.iter().enumerate() {
                if !self.axes.contains(axis) {
                    return Err(SchemaError::UndeclaredAxis {
                        container_type: self.name.clone(),
                        dataset: spec.name.clone(),
                        axis: axis.clone(),
                    });
                }
                if spec.axes[..j].contains(axis) {
                    return Err(SchemaError::RepeatedDatasetAxis {
                        dataset: spec.name.clone(),
                        axis: axis.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    pub fn datasets(&self) -> &[DatasetSpec] {
        &self.datasets
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetSpec> {
        self.datasets.iter().find(|s| s.name == name)
    }

    pub fn declares_axis(&self, axis: &str) -> bool {
        self.axes.iter().any(|a| a == axis)
    }
}

/// Container types by name.
#[derive(Debug)]
pub struct SchemaRegistry {
    types: RwLock<IndexMap<String, Arc<ContainerSchema>>>,
}

impl SchemaRegistry {
    fn with_builtin_types() -> SchemaRegistry {
        let types = types::builtin()
            .into_iter()
            .map(|s| (s.name.clone(), Arc::new(s)))
            .collect();
        SchemaRegistry {
            types: RwLock::new(types),
        }
    }

    pub fn register(&self, schema: ContainerSchema) -> Result<Arc<ContainerSchema>, SchemaError> {
        schema.validate()?;
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
        if types.contains_key(&schema.name) {
            return Err(SchemaError::DuplicateContainerType { name: schema.name });
        }
        debug!("Registering container type '{}'", schema.name);
        let schema = Arc::new(schema);
        types.insert(schema.name.clone(), Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Result<Arc<ContainerSchema>, SchemaError> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownContainerType {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

lazy_static::lazy_static! {
    static ref REGISTRY: SchemaRegistry = SchemaRegistry::with_builtin_types();
}

/// Add a container type to the global registry.
pub fn register(schema: ContainerSchema) -> Result<Arc<ContainerSchema>, SchemaError> {
    REGISTRY.register(schema)
}

/// Look up a container type in the global registry.
pub fn lookup(name: &str) -> Result<Arc<ContainerSchema>, SchemaError> {
    REGISTRY.get(name)
}

/// The names of every registered container type, built-in ones first.
pub fn registered_types() -> Vec<String> {
    REGISTRY.names()
}
