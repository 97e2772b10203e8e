use ndarray::{Array, ArrayD, IxDyn};

use super::*;
use crate::comm::{run_spmd, SelfComm};

/// A (4, 10) array where each element encodes its own index.
fn test_array() -> ArrayD<f64> {
    Array::from_shape_fn(IxDyn(&[4, 10]), |idx| (idx[0] * 100 + idx[1]) as f64)
}

#[test]
fn test_zeros_local_shapes() {
    let shapes = run_spmd(3, |comm| {
        let a = DistributedArray::<f32>::zeros(&[4, 10], 1, comm).unwrap();
        (a.local_shape().to_vec(), a.local_offset())
    });
    assert_eq!(
        shapes,
        vec![(vec![4, 4], 0), (vec![4, 3], 4), (vec![4, 3], 7)]
    );
}

#[test]
fn test_bad_axis() {
    let r = DistributedArray::<f32>::zeros(&[4, 10], 2, SelfComm::new_arc());
    assert!(matches!(r, Err(DistributedError::BadAxis { axis: 2, ndim: 2 })));
}

#[test]
fn test_local_access() {
    run_spmd(2, |comm| {
        let full = test_array();
        let mut a = DistributedArray::from_global(full.view(), 1, comm.clone()).unwrap();
        if comm.rank() == 0 {
            assert_eq!(*a.get(&[2, 4]).unwrap(), 204.0);
            assert!(matches!(
                a.get(&[2, 5]),
                Err(DistributedError::OutOfLocalRange { axis: 1, .. })
            ));
            a.set(&[0, 0], -1.0).unwrap();
            assert_eq!(a.local_array()[[0, 0]], -1.0);
        } else {
            assert_eq!(*a.get(&[3, 9]).unwrap(), 309.0);
            assert!(matches!(
                a.get_mut(&[3, 4]),
                Err(DistributedError::OutOfLocalRange { .. })
            ));
        }
        assert!(matches!(
            a.get(&[4, 0]),
            Err(DistributedError::IndexOutOfBounds { .. })
        ));
        assert!(matches!(
            a.get(&[0]),
            Err(DistributedError::IndexOutOfBounds { .. })
        ));
    });
}

#[test]
fn test_redistribute_round_trip() {
    for num_workers in [1, 2, 3, 5] {
        run_spmd(num_workers, |comm| {
            let full = test_array();
            let a = DistributedArray::from_global(full.view(), 0, comm.clone()).unwrap();
            let b = a.redistribute(1).unwrap();
            assert_eq!(b.axis(), 1);
            assert_eq!(b.global_shape(), &[4, 10]);

            // The new chunk is the right part of the full array.
            let range = b.local_range();
            let expected = full.slice_axis(Axis(1), Slice::from(range));
            assert_eq!(b.local_array(), expected);

            let c = b.redistribute(0).unwrap();
            assert_eq!(c.local_array(), a.local_array());
        });
    }
}

#[test]
fn test_redistribute_3d() {
    run_spmd(3, |comm| {
        let full = Array::from_shape_fn(IxDyn(&[5, 2, 7]), |i| (i[0] * 100 + i[1] * 10 + i[2]) as i64);
        let a = DistributedArray::from_global(full.view(), 2, comm.clone()).unwrap();
        let b = a.redistribute(0).unwrap();
        let gathered = b.allgather().unwrap();
        assert_eq!(gathered, full);
        let c = b.redistribute(2).unwrap();
        assert_eq!(c.local_array(), a.local_array());
    });
}

#[test]
fn test_gather_then_scatter() {
    run_spmd(3, |comm| {
        let full = test_array();
        let a = DistributedArray::from_global(full.view(), 1, comm.clone()).unwrap();
        let gathered = a.gather(1).unwrap();
        if comm.rank() == 1 {
            assert_eq!(gathered.as_ref(), Some(&full));
        } else {
            assert!(gathered.is_none());
        }

        let b = DistributedArray::scatter(1, gathered, 1, comm.clone()).unwrap();
        assert_eq!(b.global_shape(), a.global_shape());
        assert_eq!(b.local_array(), a.local_array());
    });
}

#[test]
fn test_scatter_without_data() {
    let results = run_spmd(2, |comm| {
        DistributedArray::<f64>::scatter(0, None, 0, comm).map(|_| ())
    });
    for r in results {
        assert!(matches!(
            r,
            Err(DistributedError::Comm(CommError::MissingPayload { rank: 0 }))
        ));
    }
}

#[test]
fn test_wrap() {
    run_spmd(3, |comm| {
        let len = partition::local_len(10, 3, comm.rank());
        let local = ArrayD::from_elem(IxDyn(&[2, len]), comm.rank() as u8);
        let a = DistributedArray::wrap(local, 1, comm.clone()).unwrap();
        assert_eq!(a.global_shape(), &[2, 10]);
        let full = a.allgather().unwrap();
        assert_eq!(full[[1, 3]], 0);
        assert_eq!(full[[1, 4]], 1);
        assert_eq!(full[[0, 9]], 2);
    });

    // Chunks that don't follow the partition rule are rejected everywhere.
    let results = run_spmd(2, |comm| {
        let len = if comm.rank() == 0 { 1 } else { 3 };
        let local = ArrayD::from_elem(IxDyn(&[len]), 0.0_f32);
        DistributedArray::wrap(local, 0, comm).map(|_| ())
    });
    for r in results {
        assert!(matches!(r, Err(DistributedError::BadLocalShape { .. })));
    }
}

#[test]
fn test_select_along_distributed_axis() {
    run_spmd(3, |comm| {
        let full = test_array();
        let a = DistributedArray::from_global(full.view(), 1, comm.clone()).unwrap();
        let indices = [9, 0, 4, 5];
        let b = a.select(1, &indices).unwrap();
        assert_eq!(b.axis(), 1);
        assert_eq!(b.global_shape(), &[4, 4]);
        let expected = full.select(Axis(1), &indices);
        assert_eq!(b.allgather().unwrap(), expected);

        let c = a.select(0, &[3, 1]).unwrap();
        assert_eq!(c.global_shape(), &[2, 10]);
        assert_eq!(c.allgather().unwrap(), full.select(Axis(0), &[3, 1]));

        assert!(matches!(
            a.select(1, &[10]),
            Err(DistributedError::IndexOutOfBounds { .. })
        ));
    });
}

#[test]
fn test_select_1d() {
    run_spmd(2, |comm| {
        let full = Array::from_shape_fn(IxDyn(&[5]), |i| i[0] as i32);
        let a = DistributedArray::from_global(full.view(), 0, comm.clone()).unwrap();
        let b = a.select(0, &[4, 2]).unwrap();
        assert_eq!(b.global_shape(), &[2]);
        assert_eq!(b.local_shape(), &[1]);
        assert_eq!(b.local_array()[[0]], if comm.rank() == 0 { 4 } else { 2 });
    });
}

#[test]
fn test_concatenate() {
    run_spmd(2, |comm| {
        let full = test_array();
        let a = DistributedArray::from_global(full.view(), 0, comm.clone()).unwrap();
        let b = a.select(1, &[0, 1]).unwrap();

        // Along a non-distributed axis.
        let c = DistributedArray::concatenate(1, &[&a, &b]).unwrap();
        assert_eq!(c.global_shape(), &[4, 12]);
        assert_eq!(c.axis(), 0);
        let all = c.allgather().unwrap();
        assert_eq!(all[[3, 10]], 300.0);
        assert_eq!(all[[3, 11]], 301.0);

        // Along the distributed axis.
        let d = DistributedArray::concatenate(0, &[&a, &a]).unwrap();
        assert_eq!(d.global_shape(), &[8, 10]);
        assert_eq!(d.axis(), 0);
        let all = d.allgather().unwrap();
        assert_eq!(all[[5, 2]], 102.0);

        assert!(matches!(
            DistributedArray::concatenate(0, &[&a, &b]),
            Err(DistributedError::ConcatShape { .. })
        ));
        assert!(matches!(
            DistributedArray::<f64>::concatenate(0, &[]),
            Err(DistributedError::NothingToConcatenate)
        ));
    });
}
