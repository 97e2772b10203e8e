//! Save containers to a directory store with one number of workers and load
//! them with another.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use num_complex::Complex32;
use tempfile::TempDir;

use pipedata::{
    container::types, run_spmd, AttrValue, Container, ContainerError, DirStore, LoadOptions,
    SelfComm, Store,
};

fn vis_value(index: &[usize]) -> Complex32 {
    Complex32::new(index[0] as f32, (index[1] * 100 + index[2]) as f32)
}

fn expected_vis(shape: &[usize]) -> ArrayD<Complex32> {
    Array::from_shape_fn(IxDyn(shape), |i| vis_value(i.slice()))
}

/// Write a 3-worker TimeStream split along time into `dir`.
fn save_time_stream(dir: &TempDir) {
    let store = DirStore::create(dir.path()).unwrap();
    run_spmd(3, |comm| {
        let mut ts = Container::builder(types::TIME_STREAM)
            .unwrap()
            .axis("freq", vec![800.0, 790.0, 780.0, 770.0])
            .unwrap()
            .axis("input", vec!["a", "b", "c"])
            .unwrap()
            .axis("stack", 2)
            .unwrap()
            .axis("time", 10)
            .unwrap()
            .comm(comm)
            .build()
            .unwrap();
        ts.redistribute("time").unwrap();

        let vis = ts.array::<Complex32>("vis").unwrap();
        let offset = vis.local_offset();
        let mut local = ts.local_mut::<Complex32>("vis").unwrap();
        assert_eq!(local.shape()[2], if offset == 0 { 4 } else { 3 });
        for (i, v) in local.indexed_iter_mut() {
            let mut i = i.slice().to_vec();
            i[2] += offset;
            *v = vis_value(&i);
        }
        ts.local_mut::<f32>("input_flags").unwrap().fill(1.0);
        ts.attrs_mut()
            .insert("tag".to_string(), AttrValue::from("night"));
        ts.save(&store, "stream").unwrap();
    });
}

#[test]
fn test_save_three_load_two() {
    let dir = TempDir::new().unwrap();
    save_time_stream(&dir);

    let store: Arc<dyn Store> = Arc::new(DirStore::open(dir.path()).unwrap());
    let gathered = run_spmd(2, |comm| {
        let ts = Container::load(Arc::clone(&store), "stream", &LoadOptions::default(), comm)
            .unwrap();
        assert_eq!(ts.attrs()["tag"], AttrValue::from("night"));
        assert_eq!(ts.axis("input").unwrap().len(), 3);
        assert_eq!(ts.dataset_names(), vec!["vis", "weight", "input_flags", "gain"]);
        let vis = ts.dataset("vis").unwrap();
        assert_eq!(vis.distributed_axis(), Some(2));
        assert_eq!(vis.local_shape().unwrap(), &[4, 2, 5]);
        assert!(ts
            .local::<f32>("input_flags")
            .unwrap()
            .iter()
            .all(|&f| f == 1.0));
        ts.to_full::<Complex32>("vis").unwrap()
    });
    for vis in gathered {
        assert_eq!(vis, expected_vis(&[4, 2, 10]));
    }
}

#[test]
fn test_lazy_load_from_disk() {
    let dir = TempDir::new().unwrap();
    save_time_stream(&dir);

    let store: Arc<dyn Store> = Arc::new(DirStore::open(dir.path()).unwrap());
    let options = LoadOptions {
        lazy: true,
        datasets: Some(vec!["vis".to_string()]),
        ..Default::default()
    };
    let ts = Container::load(store, "/stream/", &options, SelfComm::new_arc()).unwrap();
    let vis = ts.dataset("vis").unwrap();
    assert!(!vis.is_resident());
    assert_eq!(vis.shape(), &[4, 2, 10]);

    // Only the metadata has been read so far; the data comes on first access.
    let local = ts.local::<Complex32>("vis").unwrap();
    assert!(ts.dataset("vis").unwrap().is_resident());
    assert_abs_diff_eq!(local[[3, 1, 9]].re, 3.0);
    assert_abs_diff_eq!(local[[3, 1, 9]].im, 109.0);

    // Required datasets weren't asked for, so the container is only partial.
    assert!(ts.finalise().is_err());
}

#[test]
fn test_load_from_wrong_place() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        DirStore::open(dir.path().join("nope")),
        Err(pipedata::StoreError::NotADirectory { .. })
    ));
    let store: Arc<dyn Store> = Arc::new(DirStore::create(dir.path()).unwrap());
    assert!(matches!(
        Container::load(store, "", &LoadOptions::default(), SelfComm::new_arc()),
        Err(ContainerError::NotAContainer { .. })
    ));
}

#[test]
fn test_save_over_existing_group() {
    let dir = TempDir::new().unwrap();
    let store = DirStore::create(dir.path()).unwrap();
    run_spmd(2, |comm| {
        let mut old = Container::builder(types::STATIC_GAIN_DATA)
            .unwrap()
            .axis("freq", 4)
            .unwrap()
            .axis("input", vec!["a", "b", "c"])
            .unwrap()
            .comm(Arc::clone(&comm))
            .build()
            .unwrap();
        old.attrs_mut()
            .insert("old".to_string(), AttrValue::from(1_i64));
        old.save(&store, "gains").unwrap();

        let new = Container::builder(types::STATIC_GAIN_DATA)
            .unwrap()
            .axis("freq", 2)
            .unwrap()
            .axis("input", vec!["d"])
            .unwrap()
            .datasets(&["gain"])
            .comm(comm)
            .build()
            .unwrap();
        new.save(&store, "gains").unwrap();
    });
    assert!(!dir.path().join("gains/weight.meta.json").exists());
    assert!(!dir.path().join("gains/weight.bin").exists());

    let store: Arc<dyn Store> = Arc::new(store);
    let gains =
        Container::load(store, "gains", &LoadOptions::default(), SelfComm::new_arc()).unwrap();
    assert!(gains.attrs().is_empty());
    assert_eq!(gains.dataset_names(), vec!["gain"]);
    assert_eq!(gains.axis("input").unwrap().len(), 1);
    assert_eq!(gains.dataset("gain").unwrap().shape(), &[2, 1]);
}

#[test]
fn test_non_finite_attributes() {
    let dir = TempDir::new().unwrap();
    let store = DirStore::create(dir.path()).unwrap();
    let mut stack = Container::builder(types::FREQUENCY_STACK)
        .unwrap()
        .axis("freq", vec![800.0, 790.0])
        .unwrap()
        .build()
        .unwrap();
    let attrs = stack.attrs_mut();
    attrs.insert("missing".to_string(), AttrValue::Float(f64::NAN));
    attrs.insert(
        "limits".to_string(),
        AttrValue::FloatArray(vec![f64::NEG_INFINITY, 0.5, f64::INFINITY]),
    );
    attrs.insert("tag".to_string(), AttrValue::from("after"));
    stack.save(&store, "stack").unwrap();

    let store: Arc<dyn Store> = Arc::new(store);
    let stack =
        Container::load(store, "stack", &LoadOptions::default(), SelfComm::new_arc()).unwrap();
    match &stack.attrs()["missing"] {
        AttrValue::Float(x) => assert!(x.is_nan()),
        other => panic!("got {other:?}"),
    }
    assert_eq!(
        stack.attrs()["limits"],
        AttrValue::FloatArray(vec![f64::NEG_INFINITY, 0.5, f64::INFINITY])
    );
    assert_eq!(stack.attrs()["tag"], AttrValue::from("after"));
}
