//! The built-in container types.
//!
//! Each type is only a row of data; the engine in [`super::Container`] does
//! the rest. More types can be added at run time with
//! [`super::schema::register`].

use super::schema::ContainerSchema;
use crate::{dataset::DatasetSpec, element::DType};

pub const TIME_STREAM: &str = "TimeStream";
pub const SIDEREAL_STREAM: &str = "SiderealStream";
pub const MAP: &str = "Map";
pub const RING_MAP: &str = "RingMap";
pub const DELAY_SPECTRUM: &str = "DelaySpectrum";
pub const FREQUENCY_STACK: &str = "FrequencyStack";
pub const STATIC_GAIN_DATA: &str = "StaticGainData";
pub const GAIN_DATA: &str = "GainData";
pub const RFI_MASK: &str = "RFIMask";
pub const SOURCE_CATALOG: &str = "SourceCatalog";

/// Visibilities with their weights and per-input flags, along `time_axis`
/// ("time" or "ra").
fn stream(name: &str, time_axis: &str) -> ContainerSchema {
    ContainerSchema::new_unchecked(
        name,
        &["freq", "input", "prod", "stack", time_axis],
        vec![
            DatasetSpec::new("vis", &["freq", "stack", time_axis], DType::Complex64)
                .distributed()
                .required(),
            DatasetSpec::new("weight", &["freq", "stack", time_axis], DType::Float32)
                .distributed()
                .required(),
            DatasetSpec::new("input_flags", &["input", time_axis], DType::Float32).required(),
            DatasetSpec::new("gain", &["freq", "input", time_axis], DType::Complex64)
                .distributed(),
        ],
    )
}

pub(super) fn builtin() -> Vec<ContainerSchema> {
    vec![
        stream(TIME_STREAM, "time"),
        stream(SIDEREAL_STREAM, "ra"),
        ContainerSchema::new_unchecked(
            MAP,
            &["freq", "pol", "pixel"],
            vec![
                DatasetSpec::new("map", &["freq", "pol", "pixel"], DType::Float64)
                    .distributed()
                    .required(),
            ],
        ),
        ContainerSchema::new_unchecked(
            RING_MAP,
            &["beam", "pol", "freq", "ra", "el"],
            vec![
                DatasetSpec::new("map", &["beam", "pol", "freq", "ra", "el"], DType::Float64)
                    .distributed()
                    .required(),
                DatasetSpec::new("weight", &["pol", "freq", "ra"], DType::Float64)
                    .distributed()
                    .required(),
                DatasetSpec::new("dirty_beam", &["beam", "pol", "freq", "ra", "el"], DType::Float64)
                    .distributed(),
                DatasetSpec::new("rms", &["pol", "freq", "ra"], DType::Float64).distributed(),
            ],
        ),
        ContainerSchema::new_unchecked(
            DELAY_SPECTRUM,
            &["baseline", "delay", "sample"],
            vec![
                DatasetSpec::new("spectrum", &["baseline", "delay"], DType::Float64)
                    .distributed()
                    .required(),
                DatasetSpec::new("spectrum_samples", &["sample", "baseline", "delay"], DType::Float64)
                    .distributed(),
            ],
        ),
        ContainerSchema::new_unchecked(
            FREQUENCY_STACK,
            &["freq"],
            vec![
                DatasetSpec::new("stack", &["freq"], DType::Float64).required(),
                DatasetSpec::new("weight", &["freq"], DType::Float64).required(),
            ],
        ),
        ContainerSchema::new_unchecked(
            STATIC_GAIN_DATA,
            &["freq", "input"],
            vec![
                DatasetSpec::new("gain", &["freq", "input"], DType::Complex64)
                    .distributed()
                    .required(),
                DatasetSpec::new("weight", &["freq", "input"], DType::Float64).distributed(),
            ],
        ),
        ContainerSchema::new_unchecked(
            GAIN_DATA,
            &["freq", "input", "time"],
            vec![
                DatasetSpec::new("gain", &["freq", "input", "time"], DType::Complex64)
                    .distributed()
                    .required(),
                DatasetSpec::new("weight", &["freq", "time"], DType::Float64).distributed(),
            ],
        ),
        ContainerSchema::new_unchecked(
            RFI_MASK,
            &["freq", "time"],
            vec![DatasetSpec::new("mask", &["freq", "time"], DType::Bool).required()],
        ),
        ContainerSchema::new_unchecked(
            SOURCE_CATALOG,
            &["object", "coord"],
            vec![
                DatasetSpec::new("position", &["object", "coord"], DType::Float64).required(),
                DatasetSpec::new("flux", &["object"], DType::Float64),
            ],
        ),
    ]
}
