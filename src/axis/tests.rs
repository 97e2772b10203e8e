use hifitime::Epoch;
use vec1::vec1;

use super::*;

#[test]
fn test_define_rejects_empty() {
    assert_eq!(
        Axis::define("freq", 0),
        Err(SchemaError::EmptyAxis {
            name: "freq".to_string()
        })
    );
    assert!(matches!(
        Axis::define("input", Vec::<String>::new()),
        Err(SchemaError::EmptyAxis { .. })
    ));
}

#[test]
fn test_define_from_labels() {
    let freq = Axis::define("freq", vec![800.0, 790.0, 780.0]).unwrap();
    assert_eq!(freq.name(), "freq");
    assert_eq!(freq.len(), 3);
    assert_eq!(freq.labels().and_then(|l| l.get(1)), Some(Label::Float(790.0)));

    let time = Axis::define("time", 10).unwrap();
    assert_eq!(time.len(), 10);
    assert!(time.labels().is_none());
}

#[test]
fn test_compatible() {
    let a = Axis::define("time", 10).unwrap();
    let b = Axis::define("time", 10).unwrap();
    let c = Axis::define("time", 11).unwrap();
    let d = Axis::define("ra", 10).unwrap();
    assert!(compatible(&a, &b));
    assert!(!compatible(&a, &c));
    assert!(!compatible(&a, &d));

    let e = Axis::define("freq", vec![1_i64, 2]).unwrap();
    let f = Axis::define("freq", vec![1_i64, 2]).unwrap();
    assert!(compatible(&e, &f));
}

#[test]
fn test_concat() {
    let a = Axis::define("time", vec![1.0, 2.0]).unwrap();
    let b = Axis::define("time", vec![3.0]).unwrap();
    let c = concat(&a, &b).unwrap();
    assert_eq!(c.len(), 3);
    assert_eq!(
        c.labels(),
        Some(&AxisLabels::Float(vec1![1.0, 2.0, 3.0]))
    );

    let unlabelled = concat(&Axis::define("x", 4).unwrap(), &Axis::define("x", 3).unwrap()).unwrap();
    assert_eq!(unlabelled.len(), 7);
    assert!(unlabelled.labels().is_none());

    assert!(matches!(
        concat(&a, &Axis::define("ra", vec![3.0]).unwrap()),
        Err(SchemaError::AxisNameMismatch { .. })
    ));
    assert!(matches!(
        concat(&a, &Axis::define("time", 2).unwrap()),
        Err(SchemaError::AxisLabelMismatch { .. })
    ));
    assert!(matches!(
        concat(&a, &Axis::define("time", vec!["x"]).unwrap()),
        Err(SchemaError::AxisLabelMismatch { .. })
    ));
}

#[test]
fn test_select_keeps_order() {
    let input = Axis::define("input", vec!["a", "b", "c", "d"]).unwrap();
    let indices = input
        .resolve(&Selection::Labels(vec![Label::from("d"), Label::from("b")]))
        .unwrap();
    assert_eq!(indices, vec![3, 1]);
    let selected = input.select(&indices).unwrap();
    assert_eq!(selected.len(), 2);
    assert_eq!(
        selected.labels(),
        Some(&AxisLabels::Str(vec1!["d".to_string(), "b".to_string()]))
    );
}

#[test]
fn test_resolve_errors() {
    let freq = Axis::define("freq", 4).unwrap();
    assert_eq!(freq.resolve(&Selection::Range(1..3)).unwrap(), vec![1, 2]);
    assert!(matches!(
        freq.resolve(&Selection::Indices(vec![0, 4])),
        Err(SchemaError::SelectionOutOfBounds { index: 4, len: 4, .. })
    ));
    assert!(matches!(
        freq.resolve(&Selection::Range(2..6)),
        Err(SchemaError::SelectionOutOfBounds { index: 5, .. })
    ));
    assert!(matches!(
        freq.resolve(&Selection::Labels(vec![Label::from(1.0)])),
        Err(SchemaError::UnknownLabel { .. })
    ));
    assert!(matches!(freq.select(&[]), Err(SchemaError::EmptyAxis { .. })));
}

#[test]
fn test_attr_round_trip() {
    for axis in [
        Axis::define("time", 7).unwrap(),
        Axis::define("freq", vec![800.0, 750.0]).unwrap(),
        Axis::define("input", vec!["x", "y"]).unwrap(),
        Axis::define("stack", vec![5_i64, 6, 7]).unwrap(),
    ] {
        let back = Axis::from_attr(axis.name(), &axis.to_attr()).unwrap();
        assert_eq!(back, axis);
    }

    assert!(matches!(
        Axis::from_attr("time", &AttrValue::Int(0)),
        Err(SchemaError::BadAxisMetadata { .. })
    ));
    assert!(matches!(
        Axis::from_attr("time", &AttrValue::Str("ten".to_string())),
        Err(SchemaError::BadAxisMetadata { .. })
    ));
}

#[test]
fn test_time_labels_from_epochs() {
    let epochs = vec1![
        Epoch::from_unix_seconds(1_600_000_000.0),
        Epoch::from_unix_seconds(1_600_000_010.0)
    ];
    let labels = AxisLabels::from_epochs(&epochs);
    let time = Axis::define("time", labels).unwrap();
    assert_eq!(time.len(), 2);
    match time.labels() {
        Some(AxisLabels::Float(v)) => {
            approx::assert_abs_diff_eq!(v[0], 1_600_000_000.0, epsilon = 1e-6);
            approx::assert_abs_diff_eq!(v[1] - v[0], 10.0, epsilon = 1e-6);
        }
        other => panic!("unexpected labels {other:?}"),
    }
}

#[test]
fn test_display() {
    let freq = Axis::define("freq", vec![1_i64, 2, 3, 4, 5]).unwrap();
    assert_eq!(freq.to_string(), "freq (5): [1, 2, 3, 4, ...]");
    assert_eq!(Axis::define("time", 3).unwrap().to_string(), "time (3)");
}
