use ndarray::{Array, ArrayD, IxDyn};
use tempfile::TempDir;

use super::*;

fn info(dtype: DType, shape: &[usize]) -> DatasetInfo {
    DatasetInfo {
        dtype,
        shape: shape.to_vec(),
        attrs: Attributes::new(),
    }
}

fn test_array() -> ArrayD<f32> {
    Array::from_shape_fn(IxDyn(&[3, 5]), |i| (i[0] * 10 + i[1]) as f32)
}

/// Exercise a backend through the trait only.
fn check_store(store: &dyn Store) {
    store.create_group("/out/sub").unwrap();
    store.open_group("out").unwrap();
    store.open_group("out//sub/").unwrap();
    assert!(matches!(
        store.open_group("nope"),
        Err(StoreError::NoSuchGroup { .. })
    ));

    store
        .create_dataset("out", "vis", &info(DType::Float32, &[3, 5]))
        .unwrap();
    store
        .create_dataset("out", "flags", &info(DType::Bool, &[2]))
        .unwrap();
    assert_eq!(store.list_datasets("out").unwrap(), vec!["flags", "vis"]);
    assert!(store.list_datasets("out/sub").unwrap().is_empty());

    // Write the array in two chunks along the last axis.
    let full = test_array();
    for range in [0..2, 2..5] {
        let chunk = full.slice_axis(ndarray::Axis(1), ndarray::Slice::from(range.clone()));
        store
            .write_dataset(
                "out",
                "vis",
                &RawChunk::from_array(chunk.into_dyn()),
                1,
                range.start,
            )
            .unwrap();
    }
    let back: ArrayD<f32> = store
        .read_dataset("out", "vis", None)
        .unwrap()
        .into_array("vis")
        .unwrap();
    assert_eq!(back, full);

    let rows: ArrayD<f32> = store
        .read_dataset(
            "out",
            "vis",
            Some(&Hyperslab {
                axis: 0,
                range: 1..3,
            }),
        )
        .unwrap()
        .into_array("vis")
        .unwrap();
    assert_eq!(rows.shape(), &[2, 5]);
    assert_eq!(rows[[0, 4]], 14.0);

    // Unwritten datasets are zero.
    let flags: ArrayD<bool> = store
        .read_dataset("out", "flags", None)
        .unwrap()
        .into_array("flags")
        .unwrap();
    assert!(flags.iter().all(|f| !f));

    // Chunks must fit.
    let bad = RawChunk::from_array(full.view());
    assert!(matches!(
        store.write_dataset("out", "vis", &bad, 1, 1),
        Err(StoreError::BadHyperslab { .. })
    ));
    let wrong_type = RawChunk::from_array(ArrayD::<f64>::zeros(IxDyn(&[3, 5])).view());
    assert!(matches!(
        store.write_dataset("out", "vis", &wrong_type, 0, 0),
        Err(StoreError::DType { .. })
    ));
    let wrong_shape = RawChunk::from_array(ArrayD::<f32>::zeros(IxDyn(&[1, 4])).view());
    assert!(matches!(
        store.write_dataset("out", "vis", &wrong_shape, 0, 0),
        Err(StoreError::ChunkShape { .. })
    ));
    assert!(matches!(
        store.read_dataset("out", "missing", None),
        Err(StoreError::NoSuchDataset { .. })
    ));
    assert!(matches!(
        store.create_dataset("out", "a/b", &info(DType::Bool, &[1])),
        Err(StoreError::BadDatasetName { .. })
    ));

    // Attributes.
    store
        .write_attribute(AttrTarget::Group("out"), "note", &AttrValue::from("hi"))
        .unwrap();
    let target = AttrTarget::Dataset {
        group: "out",
        name: "vis",
    };
    store
        .write_attribute(target, "axis", &AttrValue::from(vec!["freq", "time"]))
        .unwrap();
    assert_eq!(
        store
            .read_attribute(AttrTarget::Group("/out"), "note")
            .unwrap(),
        AttrValue::from("hi")
    );
    assert_eq!(
        store.read_attributes(target).unwrap()["axis"],
        AttrValue::StrArray(vec!["freq".to_string(), "time".to_string()])
    );
    assert_eq!(
        store.dataset_info("out", "vis").unwrap().attrs.len(),
        1
    );
    assert!(matches!(
        store.read_attribute(AttrTarget::Group("out/sub"), "note"),
        Err(StoreError::NoSuchAttribute { .. })
    ));
}

/// Removing a group takes everything in it, and nothing beside it.
fn check_remove_group(store: &dyn Store) {
    store.create_group("keep").unwrap();
    store.create_group("old/sub").unwrap();
    store.create_group("older").unwrap();
    store
        .create_dataset("old", "vis", &info(DType::Float32, &[2]))
        .unwrap();
    store
        .write_attribute(AttrTarget::Group("old"), "note", &AttrValue::from("stale"))
        .unwrap();

    store.remove_group("/old/").unwrap();
    for group in ["old", "old/sub"] {
        assert!(matches!(
            store.open_group(group),
            Err(StoreError::NoSuchGroup { .. })
        ));
    }
    store.open_group("older").unwrap();
    store.open_group("keep").unwrap();

    // Absent groups are fine, and a recreated group starts empty.
    store.remove_group("old").unwrap();
    store.create_group("old").unwrap();
    assert!(store.list_datasets("old").unwrap().is_empty());
    assert!(store
        .read_attributes(AttrTarget::Group("old"))
        .unwrap()
        .is_empty());

    // The root group itself stays.
    store.remove_group("/").unwrap();
    store.open_group("").unwrap();
    assert!(matches!(
        store.open_group("keep"),
        Err(StoreError::NoSuchGroup { .. })
    ));
}

#[test]
fn test_mem_store_remove_group() {
    check_remove_group(&MemStore::new());
}

#[test]
fn test_dir_store_remove_group() {
    let dir = TempDir::new().unwrap();
    let store = DirStore::create(dir.path().join("store")).unwrap();
    check_remove_group(&store);
    assert!(dir.path().join("store").is_dir());
}

#[test]
fn test_mem_store() {
    let store = MemStore::new();
    check_store(&store);

    // Clones share contents.
    let other = store.clone();
    assert_eq!(other.list_datasets("out").unwrap().len(), 2);
}

#[test]
fn test_dir_store() {
    let dir = TempDir::new().unwrap();
    let store = DirStore::create(dir.path().join("store")).unwrap();
    check_store(&store);

    assert!(dir.path().join("store/out/vis.bin").is_file());
    assert!(dir.path().join("store/out/vis.meta.json").is_file());
    assert!(dir.path().join("store/out/group.attrs.json").is_file());

    // A second handle sees the same data.
    let reopened = DirStore::open(dir.path().join("store")).unwrap();
    assert_eq!(
        reopened
            .dataset_info("out", "vis")
            .unwrap()
            .shape,
        vec![3, 5]
    );
    assert!(matches!(
        DirStore::open(dir.path().join("nope")),
        Err(StoreError::NotADirectory { .. })
    ));
}

#[test]
fn test_dir_store_truncated_body() {
    let dir = TempDir::new().unwrap();
    let store = DirStore::create(dir.path()).unwrap();
    store
        .create_dataset("", "x", &info(DType::Float64, &[4]))
        .unwrap();
    std::fs::write(dir.path().join("x.bin"), [0_u8; 8]).unwrap();
    assert!(matches!(
        store.read_dataset("", "x", None),
        Err(StoreError::BodySize {
            expected: 32,
            actual: 8,
            ..
        })
    ));
}

#[test]
fn test_concurrent_chunk_writes() {
    let dir = TempDir::new().unwrap();
    let store = DirStore::create(dir.path()).unwrap();
    store
        .create_dataset("", "x", &info(DType::Int64, &[10, 2]))
        .unwrap();
    let full = Array::from_shape_fn(IxDyn(&[10, 2]), |i| (i[0] * 2 + i[1]) as i64);
    std::thread::scope(|s| {
        for (start, end) in [(0, 4), (4, 7), (7, 10)] {
            let store = &store;
            let full = &full;
            s.spawn(move || {
                let chunk = full.slice_axis(ndarray::Axis(0), ndarray::Slice::from(start..end));
                store
                    .write_dataset("", "x", &RawChunk::from_array(chunk), 0, start)
                    .unwrap();
            });
        }
    });
    let back: ArrayD<i64> = store
        .read_dataset("", "x", None)
        .unwrap()
        .into_array("x")
        .unwrap();
    assert_eq!(back, full);
}

#[test]
fn test_paths() {
    assert_eq!(normalise("/a//b/"), "a/b");
    assert_eq!(normalise("/"), "");
    assert_eq!(join("", "index_map"), "index_map");
    assert_eq!(join("/run/", "index_map"), "run/index_map");
    assert_eq!(dataset_path("run", "vis"), "/run/vis");
}
