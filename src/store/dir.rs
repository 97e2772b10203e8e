//! A store kept in a directory tree.
//!
//! Groups are directories. A dataset `name` is two files in its group's
//! directory: `name.meta.json` (its [`DatasetInfo`]) and `name.bin`, the raw
//! little-endian C-order body. Group attributes are in `group.attrs.json`.
//! Hyperslabs are read and written by seeking into the body, so workers can
//! write their chunks of one dataset at the same time.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, trace};
use serde::{de::DeserializeOwned, Serialize};

use super::{
    chunk_slab, check_dataset_name, dataset_path, normalise, slab::SlabGeometry, AttrTarget,
    DatasetInfo, Hyperslab, RawChunk, Store, StoreError,
};
use crate::attrs::{AttrValue, Attributes};

const GROUP_ATTRS_FILE: &str = "group.attrs.json";
const META_SUFFIX: &str = ".meta.json";
const BODY_SUFFIX: &str = ".bin";

#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let file = File::open(path).map_err(io_error(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_error(path))
}

impl DirStore {
    /// Use `root` as a store, creating the directory if needed.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<DirStore, StoreError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(io_error(root))?;
        debug!("Using store directory {}", root.display());
        Ok(DirStore {
            root: root.to_path_buf(),
        })
    }

    /// Use an existing directory as a store.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<DirStore, StoreError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StoreError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        Ok(DirStore {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, group: &str) -> PathBuf {
        let mut dir = self.root.clone();
        for part in normalise(group).split('/').filter(|s| !s.is_empty()) {
            dir.push(part);
        }
        dir
    }

    /// The directory of an existing group.
    fn existing_group_dir(&self, group: &str) -> Result<PathBuf, StoreError> {
        let dir = self.group_dir(group);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::NoSuchGroup {
                group: normalise(group),
            })
        }
    }

    fn meta_path(&self, group: &str, name: &str) -> PathBuf {
        self.group_dir(group).join(format!("{name}{META_SUFFIX}"))
    }

    fn body_path(&self, group: &str, name: &str) -> PathBuf {
        self.group_dir(group).join(format!("{name}{BODY_SUFFIX}"))
    }

    fn group_attrs(&self, group: &str) -> Result<Attributes, StoreError> {
        let path = self.existing_group_dir(group)?.join(GROUP_ATTRS_FILE);
        if path.exists() {
            read_json(&path)
        } else {
            Ok(Attributes::new())
        }
    }
}

impl Store for DirStore {
    fn create_group(&self, group: &str) -> Result<(), StoreError> {
        let dir = self.group_dir(group);
        fs::create_dir_all(&dir).map_err(io_error(&dir))
    }

    fn open_group(&self, group: &str) -> Result<(), StoreError> {
        self.existing_group_dir(group).map(|_| ())
    }

    fn remove_group(&self, group: &str) -> Result<(), StoreError> {
        let dir = self.group_dir(group);
        if !dir.is_dir() {
            return Ok(());
        }
        trace!("Removing {}", dir.display());
        if normalise(group).is_empty() {
            // Keep the store directory itself.
            for entry in fs::read_dir(&dir).map_err(io_error(&dir))? {
                let path = entry.map_err(io_error(&dir))?.path();
                if path.is_dir() {
                    fs::remove_dir_all(&path).map_err(io_error(&path))?;
                } else {
                    fs::remove_file(&path).map_err(io_error(&path))?;
                }
            }
            Ok(())
        } else {
            fs::remove_dir_all(&dir).map_err(io_error(&dir))
        }
    }

    fn list_datasets(&self, group: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.existing_group_dir(group)?;
        let mut names = vec![];
        for entry in fs::read_dir(&dir).map_err(io_error(&dir))? {
            let entry = entry.map_err(io_error(&dir))?;
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|f| f.strip_suffix(META_SUFFIX)) {
                names.push(name.to_string());
            }
        }
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
        self.existing_group_dir(group)?;
        trace!("Creating {} {:?}", dataset_path(group, name), info.shape);
        write_json(&self.meta_path(group, name), info)?;
        let body_path = self.body_path(group, name);
        let body = File::create(&body_path).map_err(io_error(&body_path))?;
        body.set_len(info.num_bytes() as u64)
            .map_err(io_error(&body_path))
    }

    fn dataset_info(&self, group: &str, name: &str) -> Result<DatasetInfo, StoreError> {
        let path = self.meta_path(group, name);
        if !path.exists() {
            return Err(StoreError::NoSuchDataset {
                group: normalise(group),
                name: name.to_string(),
            });
        }
        read_json(&path)
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
        let info = self.dataset_info(group, name)?;
        let slab = chunk_slab(&path, &info, chunk, axis, offset)?;
        let geometry = SlabGeometry::new(&path, &info.shape, info.dtype.size(), &slab)?;
        if geometry.len() == 0 {
            return Ok(());
        }

        let body_path = self.body_path(group, name);
        let mut body = OpenOptions::new()
            .write(true)
            .open(&body_path)
            .map_err(io_error(&body_path))?;
        if geometry.run == geometry.stride {
            // One contiguous block.
            body.seek(SeekFrom::Start(geometry.start as u64))
                .and_then(|_| body.write_all(&chunk.bytes))
                .map_err(io_error(&body_path))?;
        } else {
            for (src, pos) in chunk.bytes.chunks(geometry.run).zip(geometry.offsets()) {
                body.seek(SeekFrom::Start(pos as u64))
                    .and_then(|_| body.write_all(src))
                    .map_err(io_error(&body_path))?;
            }
        }
        body.flush().map_err(io_error(&body_path))
    }

    fn read_dataset(
        &self,
        group: &str,
        name: &str,
        slab: Option<&Hyperslab>,
    ) -> Result<RawChunk, StoreError> {
        let path = dataset_path(group, name);
        let info = self.dataset_info(group, name)?;
        let full = Hyperslab::full(&info.shape);
        let slab = slab.unwrap_or(&full);
        let geometry = SlabGeometry::new(&path, &info.shape, info.dtype.size(), slab)?;

        let body_path = self.body_path(group, name);
        let mut body = File::open(&body_path).map_err(io_error(&body_path))?;
        let actual = body.metadata().map_err(io_error(&body_path))?.len();
        let expected = info.num_bytes() as u64;
        if actual != expected {
            return Err(StoreError::BodySize {
                path,
                expected,
                actual,
            });
        }

        let mut bytes = vec![0; geometry.len()];
        if geometry.run > 0 {
            for (dst, pos) in bytes.chunks_mut(geometry.run).zip(geometry.offsets()) {
                body.seek(SeekFrom::Start(pos as u64))
                    .and_then(|_| body.read_exact(dst))
                    .map_err(io_error(&body_path))?;
            }
        }
        Ok(RawChunk {
            dtype: info.dtype,
            shape: slab.shape(&info.shape),
            bytes,
        })
    }

    fn write_attribute(
        &self,
        target: AttrTarget<'_>,
        key: &str,
        value: &AttrValue,
    ) -> Result<(), StoreError> {
        match target {
            AttrTarget::Group(group) => {
                let mut attrs = self.group_attrs(group)?;
                attrs.insert(key.to_string(), value.clone());
                write_json(&self.group_dir(group).join(GROUP_ATTRS_FILE), &attrs)
            }
            AttrTarget::Dataset { group, name } => {
                let mut info = self.dataset_info(group, name)?;
                info.attrs.insert(key.to_string(), value.clone());
                write_json(&self.meta_path(group, name), &info)
            }
        }
    }

    fn read_attributes(&self, target: AttrTarget<'_>) -> Result<Attributes, StoreError> {
        match target {
            AttrTarget::Group(group) => self.group_attrs(group),
            AttrTarget::Dataset { group, name } => Ok(self.dataset_info(group, name)?.attrs),
        }
    }
}
