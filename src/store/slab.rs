//! Byte-level geometry of a hyperslab inside a C-order dataset body.
//!
//! A hyperslab covering `range` along `axis` of a dataset with `shape` is a
//! set of `outer` equally-spaced runs of bytes, one per index of the axes
//! before `axis`. This is shared by the in-memory and on-disk backends.

use rayon::prelude::*;

use super::{Hyperslab, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlabGeometry {
    /// The number of runs.
    pub(crate) outer: usize,
    /// The distance in bytes between the starts of consecutive runs.
    pub(crate) stride: usize,
    /// Where the first run starts.
    pub(crate) start: usize,
    /// The length of each run in bytes.
    pub(crate) run: usize,
}

impl SlabGeometry {
    pub(crate) fn new(
        path: &str,
        shape: &[usize],
        elem_size: usize,
        slab: &Hyperslab,
    ) -> Result<SlabGeometry, StoreError> {
        let bad = || StoreError::BadHyperslab {
            path: path.to_string(),
            shape: shape.to_vec(),
            axis: slab.axis,
            start: slab.range.start,
            end: slab.range.end,
        };
        // Zero-dimensional datasets are a single element.
        if shape.is_empty() {
            return if slab.axis == 0 && slab.range == (0..1) {
                Ok(SlabGeometry {
                    outer: 1,
                    stride: elem_size,
                    start: 0,
                    run: elem_size,
                })
            } else {
                Err(bad())
            };
        }
        let axis_len = *shape.get(slab.axis).ok_or_else(bad)?;
        if slab.range.start > slab.range.end || slab.range.end > axis_len {
            return Err(bad());
        }

        let outer: usize = shape[..slab.axis].iter().product();
        let inner: usize = shape[slab.axis + 1..].iter().product::<usize>() * elem_size;
        Ok(SlabGeometry {
            outer,
            stride: axis_len * inner,
            start: slab.range.start * inner,
            run: slab.range.len() * inner,
        })
    }

    /// The number of bytes in the hyperslab.
    pub(crate) fn len(&self) -> usize {
        self.outer * self.run
    }

    /// The byte offset of each run.
    pub(crate) fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.outer).map(move |o| o * self.stride + self.start)
    }

    /// Copy `chunk` (the hyperslab's bytes, packed) into `body`.
    pub(crate) fn insert(&self, body: &mut [u8], chunk: &[u8]) {
        if self.run == 0 || self.stride == 0 {
            return;
        }
        let (start, run) = (self.start, self.run);
        body.par_chunks_mut(self.stride)
            .zip(chunk.par_chunks(run))
            .for_each(|(dst, src)| dst[start..start + run].copy_from_slice(src));
    }

    /// Copy the hyperslab's bytes out of `body`, packed.
    pub(crate) fn extract(&self, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0; self.len()];
        if self.run == 0 || self.stride == 0 {
            return out;
        }
        let (start, run) = (self.start, self.run);
        out.par_chunks_mut(run)
            .zip(body.par_chunks(self.stride))
            .for_each(|(dst, src)| dst.copy_from_slice(&src[start..start + run]));
        out
    }
}
