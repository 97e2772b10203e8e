//! A store that lives in memory. Clones share contents, so it can be handed to
//! every worker of a group, or from one pipeline stage to the next.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use log::trace;

use super::{
    chunk_slab, check_dataset_name, dataset_path, normalise, slab::SlabGeometry, AttrTarget,
    DatasetInfo, Hyperslab, RawChunk, Store, StoreError,
};
use crate::attrs::{AttrValue, Attributes};

#[derive(Debug)]
struct MemDataset {
    info: DatasetInfo,
    body: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemGroup {
    attrs: Attributes,
    datasets: IndexMap<String, MemDataset>,
}

#[derive(Debug, Clone)]
pub struct MemStore {
    /// Keyed by normalised group path.
    groups: Arc<Mutex<IndexMap<String, MemGroup>>>,
}

impl MemStore {
    /// An empty store with just the root group.
    pub fn new() -> MemStore {
        let mut groups = IndexMap::new();
        groups.insert(String::new(), MemGroup::default());
        MemStore {
            groups: Arc::new(Mutex::new(groups)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, MemGroup>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        MemStore::new()
    }
}

fn group_mut<'a>(
    groups: &'a mut IndexMap<String, MemGroup>,
    group: &str,
) -> Result<&'a mut MemGroup, StoreError> {
    let key = normalise(group);
    groups
        .get_mut(&key)
        .ok_or(StoreError::NoSuchGroup { group: key })
}

fn dataset_mut<'a>(
    groups: &'a mut IndexMap<String, MemGroup>,
    group: &str,
    name: &str,
) -> Result<&'a mut MemDataset, StoreError> {
    group_mut(groups, group)?
        .datasets
        .get_mut(name)
        .ok_or_else(|| StoreError::NoSuchDataset {
            group: normalise(group),
            name: name.to_string(),
        })
}

impl Store for MemStore {
    fn create_group(&self, group: &str) -> Result<(), StoreError> {
        let key = normalise(group);
        let mut groups = self.lock();
        groups.entry(String::new()).or_default();
        let mut path = String::new();
        for part in key.split('/').filter(|s| !s.is_empty()) {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(part);
            groups.entry(path.clone()).or_default();
        }
        Ok(())
    }

    fn open_group(&self, group: &str) -> Result<(), StoreError> {
        let key = normalise(group);
        if self.lock().contains_key(&key) {
            Ok(())
        } else {
            Err(StoreError::NoSuchGroup { group: key })
        }
    }

    fn remove_group(&self, group: &str) -> Result<(), StoreError> {
        let key = normalise(group);
        trace!("Removing group /{key}");
        let mut groups = self.lock();
        if key.is_empty() {
            groups.clear();
            groups.insert(String::new(), MemGroup::default());
        } else {
            let prefix = format!("{key}/");
            groups.retain(|path, _| *path != key && !path.starts_with(&prefix));
        }
        Ok(())
    }

    fn list_datasets(&self, group: &str) -> Result<Vec<String>, StoreError> {
        let mut groups = self.lock();
        let mut names: Vec<String> = group_mut(&mut groups, group)?
            .datasets
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    fn create_dataset(
        &self,
        group: &str,
        name: &str,
        info: &DatasetInfo,
    ) -> Result<(), StoreError> {
        check_dataset_name(name)?;
        trace!("Creating {} {:?}", dataset_path(group, name), info.shape);
        let mut groups = self.lock();
        group_mut(&mut groups, group)?.datasets.insert(
            name.to_string(),
            MemDataset {
                info: info.clone(),
                body: vec![0; info.num_bytes()],
            },
        );
        Ok(())
    }

    fn dataset_info(&self, group: &str, name: &str) -> Result<DatasetInfo, StoreError> {
        let mut groups = self.lock();
        Ok(dataset_mut(&mut groups, group, name)?.info.clone())
    }

    fn write_dataset(
        &self,
        group: &str,
        name: &str,
        chunk: &RawChunk,
        axis: usize,
        offset: usize,
    ) -> Result<(), StoreError> {
        let path = dataset_path(group, name);
        let mut groups = self.lock();
        let dataset = dataset_mut(&mut groups, group, name)?;
        let slab = chunk_slab(&path, &dataset.info, chunk, axis, offset)?;
        let geometry =
            SlabGeometry::new(&path, &dataset.info.shape, dataset.info.dtype.size(), &slab)?;
        geometry.insert(&mut dataset.body, &chunk.bytes);
        Ok(())
    }

    fn read_dataset(
        &self,
        group: &str,
        name: &str,
        slab: Option<&Hyperslab>,
    ) -> Result<RawChunk, StoreError> {
        let path = dataset_path(group, name);
        let mut groups = self.lock();
        let dataset = dataset_mut(&mut groups, group, name)?;
        let info = &dataset.info;
        let full = Hyperslab::full(&info.shape);
        let slab = slab.unwrap_or(&full);
        let geometry = SlabGeometry::new(&path, &info.shape, info.dtype.size(), slab)?;
        Ok(RawChunk {
            dtype: info.dtype,
            shape: slab.shape(&info.shape),
            bytes: geometry.extract(&dataset.body),
        })
    }

    fn write_attribute(
        &self,
        target: AttrTarget<'_>,
        key: &str,
        value: &AttrValue,
    ) -> Result<(), StoreError> {
        let mut groups = self.lock();
        let attrs = match target {
            AttrTarget::Group(group) => &mut group_mut(&mut groups, group)?.attrs,
            AttrTarget::Dataset { group, name } => {
                &mut dataset_mut(&mut groups, group, name)?.info.attrs
            }
        };
        attrs.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn read_attributes(&self, target: AttrTarget<'_>) -> Result<Attributes, StoreError> {
        let mut groups = self.lock();
        Ok(match target {
            AttrTarget::Group(group) => group_mut(&mut groups, group)?.attrs.clone(),
            AttrTarget::Dataset { group, name } => {
                dataset_mut(&mut groups, group, name)?.info.attrs.clone()
            }
        })
    }
}
