//! Distributed, axis-indexed data containers for radio-interferometer
//! analysis pipelines.
//!
//! A [`Container`] has named axes, datasets bound to ordered subsets of those
//! axes, and attributes. Which axes and datasets a container may have is set
//! by its type, a [`ContainerSchema`] looked up by name. Large datasets are
//! split along one axis over a group of workers (see [`comm`]), and can be
//! moved to another axis, gathered, sliced and joined. Containers are saved to
//! and loaded from a hierarchical [`store`], with every worker writing and
//! reading only its own part.

pub mod attrs;
pub mod axis;
pub mod comm;
pub mod container;
pub mod dataset;
pub mod distributed;
pub mod element;
mod error;
pub mod store;

pub use attrs::{AttrValue, Attributes};
pub use axis::{Axis, AxisDef, Label, Selection};
pub use comm::{run_spmd, CommError, Communicator, SelfComm, ThreadComm};
pub use container::{Container, ContainerBuilder, ContainerSchema, LoadOptions};
pub use dataset::{Dataset, DatasetSpec};
pub use distributed::{DistributedArray, DistributedError};
pub use element::{DType, Element};
pub use error::{ContainerError, SchemaError};
pub use store::{DirStore, MemStore, Store, StoreError};
