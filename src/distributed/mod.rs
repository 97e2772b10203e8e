//! Arrays split over a group of workers along one axis.
//!
//! A [`DistributedArray`] has a global shape that every worker agrees on, and
//! each worker holds one contiguous chunk of it along the *distributed axis*.
//! Concatenating the chunks in rank order gives back the whole array. Chunk
//! boundaries come from [`partition`], so nobody needs to ask where their chunk
//! is.
//!
//! Methods that move data between workers are collective; see
//! [`crate::comm`].

mod error;
pub mod partition;
#[cfg(test)]
mod tests;

pub use error::DistributedError;

use std::{ops::Range, sync::Arc};

use log::trace;
use ndarray::{concatenate, ArrayD, ArrayViewD, ArrayViewMutD, Axis, IxDyn, Slice};

use crate::{
    comm::{self, CommError, Communicator},
    element::Element,
};

#[derive(Debug, Clone)]
pub struct DistributedArray<T> {
    global_shape: Vec<usize>,
    /// The distributed axis.
    axis: usize,
    local: ArrayD<T>,
    comm: Arc<dyn Communicator>,
}

fn check_axis(axis: usize, ndim: usize) -> Result<(), DistributedError> {
    if axis >= ndim {
        return Err(DistributedError::BadAxis { axis, ndim });
    }
    Ok(())
}

/// The shape of `rank`'s chunk of an array split along `axis`.
fn chunk_shape(global_shape: &[usize], axis: usize, size: usize, rank: usize) -> Vec<usize> {
    let mut shape = global_shape.to_vec();
    shape[axis] = partition::local_len(global_shape[axis], size, rank);
    shape
}

/// The axis an array is moved to when it has to stop being distributed along
/// `axis` for a while.
fn other_axis(axis: usize) -> usize {
    if axis == 0 {
        1
    } else {
        0
    }
}

impl<T: Element> DistributedArray<T> {
    /// A zero-filled array. Not collective; every worker allocates only its own
    /// chunk.
    pub fn zeros(
        global_shape: &[usize],
        axis: usize,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, DistributedError> {
        check_axis(axis, global_shape.len())?;
        let shape = chunk_shape(global_shape, axis, comm.size(), comm.rank());
        Ok(DistributedArray {
            global_shape: global_shape.to_vec(),
            axis,
            local: ArrayD::from_elem(IxDyn(&shape), T::zero()),
            comm,
        })
    }

    /// Assemble an array from this worker's chunk, which must have exactly the
    /// shape the partition rule gives it. Not collective.
    pub(crate) fn from_local_parts(
        global_shape: Vec<usize>,
        axis: usize,
        local: ArrayD<T>,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, DistributedError> {
        check_axis(axis, global_shape.len())?;
        let expected = chunk_shape(&global_shape, axis, comm.size(), comm.rank());
        if local.shape() != expected.as_slice() {
            return Err(DistributedError::BadLocalShape {
                expected,
                actual: local.shape().to_vec(),
            });
        }
        Ok(DistributedArray {
            global_shape,
            axis,
            local,
            comm,
        })
    }

    /// Turn every worker's chunk into one distributed array. The chunks must
    /// agree on every axis other than `axis`, and along `axis` their lengths
    /// must follow the partition rule. Collective.
    pub fn wrap(
        local: ArrayD<T>,
        axis: usize,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, DistributedError> {
        check_axis(axis, local.ndim())?;
        let shapes = comm::all_gather(&*comm, local.shape().to_vec())?;
        let mut global_shape = local.shape().to_vec();
        global_shape[axis] = shapes
            .iter()
            .map(|s| s.get(axis).copied().unwrap_or(0))
            .sum();
        for (rank, shape) in shapes.into_iter().enumerate() {
            let expected = chunk_shape(&global_shape, axis, comm.size(), rank);
            if shape != expected {
                return Err(DistributedError::BadLocalShape {
                    expected,
                    actual: shape,
                });
            }
        }
        Self::from_local_parts(global_shape, axis, local, comm)
    }

    /// Keep this worker's part of an array that every worker holds in full.
    /// Not collective.
    pub fn from_global(
        full: ArrayViewD<T>,
        axis: usize,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, DistributedError> {
        check_axis(axis, full.ndim())?;
        let range = partition::local_range(full.shape()[axis], comm.size(), comm.rank());
        let local = full.slice_axis(Axis(axis), Slice::from(range)).to_owned();
        Self::from_local_parts(full.shape().to_vec(), axis, local, comm)
    }

    pub fn global_shape(&self) -> &[usize] {
        &self.global_shape
    }

    pub fn local_shape(&self) -> &[usize] {
        self.local.shape()
    }

    pub fn ndim(&self) -> usize {
        self.global_shape.len()
    }

    /// The distributed axis.
    pub fn axis(&self) -> usize {
        self.axis
    }

    pub fn comm(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    /// The global index of the first element of this worker's chunk along the
    /// distributed axis.
    pub fn local_offset(&self) -> usize {
        partition::local_start(
            self.global_shape[self.axis],
            self.comm.size(),
            self.comm.rank(),
        )
    }

    /// The global indices this worker holds along the distributed axis.
    pub fn local_range(&self) -> Range<usize> {
        partition::local_range(
            self.global_shape[self.axis],
            self.comm.size(),
            self.comm.rank(),
        )
    }

    pub fn local_array(&self) -> ArrayViewD<T> {
        self.local.view()
    }

    pub fn local_array_mut(&mut self) -> ArrayViewMutD<T> {
        self.local.view_mut()
    }

    pub fn into_local(self) -> ArrayD<T> {
        self.local
    }

    /// Convert a global index into an index of the local chunk.
    fn to_local_index(&self, index: &[usize]) -> Result<Vec<usize>, DistributedError> {
        if index.len() != self.ndim()
            || index.iter().zip(&self.global_shape).any(|(i, n)| i >= n)
        {
            return Err(DistributedError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.global_shape.clone(),
            });
        }
        let local = self.local_range();
        if !local.contains(&index[self.axis]) {
            return Err(DistributedError::OutOfLocalRange {
                index: index.to_vec(),
                axis: self.axis,
                local,
            });
        }
        let mut local_index = index.to_vec();
        local_index[self.axis] -= local.start;
        Ok(local_index)
    }

    /// The element at a *global* index, which must be held by this worker.
    pub fn get(&self, index: &[usize]) -> Result<&T, DistributedError> {
        let local_index = self.to_local_index(index)?;
        self.local
            .get(local_index.as_slice())
            .ok_or_else(|| DistributedError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.global_shape.clone(),
            })
    }

    pub fn get_mut(&mut self, index: &[usize]) -> Result<&mut T, DistributedError> {
        let local_index = self.to_local_index(index)?;
        let shape = self.global_shape.clone();
        self.local
            .get_mut(local_index.as_slice())
            .ok_or_else(|| DistributedError::IndexOutOfBounds {
                index: index.to_vec(),
                shape,
            })
    }

    pub fn set(&mut self, index: &[usize], value: T) -> Result<(), DistributedError> {
        *self.get_mut(index)? = value;
        Ok(())
    }

    /// Split the array along `new_axis` instead. Every worker sends every other
    /// worker the part of its chunk that falls in that worker's new range, in
    /// one exchange. Collective.
    pub fn redistribute(&self, new_axis: usize) -> Result<Self, DistributedError> {
        check_axis(new_axis, self.ndim())?;
        if new_axis == self.axis {
            return Ok(self.clone());
        }
        let size = self.comm.size();
        let rank = self.comm.rank();
        trace!(
            "Rank {rank}: redistributing {:?} from axis {} to {new_axis}",
            self.global_shape,
            self.axis
        );

        let new_len = self.global_shape[new_axis];
        let outgoing: Vec<ArrayD<T>> = (0..size)
            .map(|j| {
                let range = partition::local_range(new_len, size, j);
                self.local
                    .slice_axis(Axis(new_axis), Slice::from(range))
                    .to_owned()
            })
            .collect();
        let incoming = comm::all_to_all(&*self.comm, outgoing)?;

        let new_shape = chunk_shape(&self.global_shape, new_axis, size, rank);
        let mut local = ArrayD::from_elem(IxDyn(&new_shape), T::zero());
        let old_len = self.global_shape[self.axis];
        for (i, block) in incoming.into_iter().enumerate() {
            let range = partition::local_range(old_len, size, i);
            let mut dst = local.slice_axis_mut(Axis(self.axis), Slice::from(range));
            if dst.shape() != block.shape() {
                return Err(DistributedError::BadLocalShape {
                    expected: dst.shape().to_vec(),
                    actual: block.shape().to_vec(),
                });
            }
            dst.assign(&block);
        }

        Ok(DistributedArray {
            global_shape: self.global_shape.clone(),
            axis: new_axis,
            local,
            comm: Arc::clone(&self.comm),
        })
    }

    /// Put the whole array on `root`. Other workers get `None`. Collective.
    pub fn gather(&self, root: usize) -> Result<Option<ArrayD<T>>, DistributedError> {
        comm::check_root(&*self.comm, root)?;
        let outgoing = (0..self.comm.size())
            .map(|j| (j == root).then(|| self.local.clone()))
            .collect();
        let incoming = comm::all_to_all(&*self.comm, outgoing)?;
        if self.comm.rank() != root {
            return Ok(None);
        }
        let chunks = incoming
            .into_iter()
            .enumerate()
            .map(|(rank, chunk)| chunk.ok_or(CommError::MissingPayload { rank }))
            .collect::<Result<Vec<_>, _>>()?;
        let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
        Ok(Some(concatenate(Axis(self.axis), &views)?))
    }

    /// Put the whole array on every worker. Collective.
    pub fn allgather(&self) -> Result<ArrayD<T>, DistributedError> {
        let chunks = comm::all_gather(&*self.comm, self.local.clone())?;
        let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
        Ok(concatenate(Axis(self.axis), &views)?)
    }

    /// Split `full`, which only `root` needs to supply, along `axis` and hand
    /// each worker its chunk. Collective.
    pub fn scatter(
        root: usize,
        full: Option<ArrayD<T>>,
        axis: usize,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, DistributedError> {
        comm::check_root(&*comm, root)?;
        let size = comm.size();
        let chunks = match full {
            Some(full) if comm.rank() == root && axis < full.ndim() => {
                let global_shape = full.shape().to_vec();
                let chunks: Vec<_> = (0..size)
                    .map(|j| {
                        let range = partition::local_range(global_shape[axis], size, j);
                        let chunk = full.slice_axis(Axis(axis), Slice::from(range)).to_owned();
                        Some((global_shape.clone(), chunk))
                    })
                    .collect();
                Some(chunks)
            }
            _ => None,
        };
        // If root can't split anything it still takes part, so nobody waits
        // forever.
        let outgoing = chunks.unwrap_or_else(|| vec![None; size]);
        let mut incoming = comm::all_to_all(&*comm, outgoing)?;
        let (global_shape, local) = incoming
            .swap_remove(root)
            .ok_or(CommError::MissingPayload { rank: root })?;
        Self::from_local_parts(global_shape, axis, local, comm)
    }

    /// The elements at `indices` along `axis`, in that order. Selecting along
    /// the distributed axis moves data between workers. Collective in that
    /// case.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Result<Self, DistributedError> {
        check_axis(axis, self.ndim())?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.global_shape[axis]) {
            let mut index = vec![0; self.ndim()];
            index[axis] = bad;
            return Err(DistributedError::IndexOutOfBounds {
                index,
                shape: self.global_shape.clone(),
            });
        }

        if axis != self.axis {
            let mut global_shape = self.global_shape.clone();
            global_shape[axis] = indices.len();
            return Ok(DistributedArray {
                global_shape,
                axis: self.axis,
                local: self.local.select(Axis(axis), indices),
                comm: Arc::clone(&self.comm),
            });
        }

        if self.ndim() > 1 {
            return self
                .redistribute(other_axis(axis))?
                .select(axis, indices)?
                .redistribute(axis);
        }
        let full = self.allgather()?;
        let selected = full.select(Axis(axis), indices);
        Self::from_global(selected.view(), axis, Arc::clone(&self.comm))
    }

    /// Join arrays end to end along `axis`. The arrays must have the same
    /// shape on every other axis. The result is distributed like the first
    /// array. Collective if any array needs to move.
    pub fn concatenate(axis: usize, arrays: &[&Self]) -> Result<Self, DistributedError> {
        let first = *arrays
            .first()
            .ok_or(DistributedError::NothingToConcatenate)?;
        check_axis(axis, first.ndim())?;
        for other in &arrays[1..] {
            let same_elsewhere = other.ndim() == first.ndim()
                && (0..first.ndim())
                    .filter(|&d| d != axis)
                    .all(|d| other.global_shape[d] == first.global_shape[d]);
            if !same_elsewhere {
                return Err(DistributedError::ConcatShape {
                    a: first.global_shape.clone(),
                    b: other.global_shape.clone(),
                    axis,
                });
            }
        }

        let dist_axis = first.axis;
        if axis == dist_axis {
            if first.ndim() > 1 {
                let moved = arrays
                    .iter()
                    .map(|a| a.redistribute(other_axis(axis)))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&Self> = moved.iter().collect();
                return Self::concatenate(axis, &refs)?.redistribute(axis);
            }
            let fulls = arrays
                .iter()
                .map(|a| a.allgather())
                .collect::<Result<Vec<_>, _>>()?;
            let views: Vec<_> = fulls.iter().map(|f| f.view()).collect();
            let full = concatenate(Axis(axis), &views)?;
            return Self::from_global(full.view(), axis, Arc::clone(&first.comm));
        }

        // Every array has the same length along the distributed axis, so once
        // they're all split along it the local chunks line up.
        let aligned = arrays
            .iter()
            .map(|a| a.redistribute(dist_axis))
            .collect::<Result<Vec<_>, _>>()?;
        let views: Vec<_> = aligned.iter().map(|a| a.local.view()).collect();
        let local = concatenate(Axis(axis), &views)?;
        let mut global_shape = first.global_shape.clone();
        global_shape[axis] = arrays.iter().map(|a| a.global_shape[axis]).sum();
        Self::from_local_parts(global_shape, dist_axis, local, Arc::clone(&first.comm))
    }
}
