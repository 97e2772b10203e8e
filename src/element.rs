//! Element types that datasets can hold, and their on-disk encoding.

use std::fmt::{Debug, Display};

use byteorder::{ByteOrder, LittleEndian};
use num_complex::{Complex32, Complex64};
use serde::{Deserialize, Serialize};

use crate::dataset::{Storage, TypedStorage};

/// The element type tag of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Bool,
    Uint8,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Two `f32`s.
    Complex64,
    /// Two `f64`s.
    Complex128,
}

impl DType {
    /// The number of bytes used to store one element.
    pub fn size(self) -> usize {
        match self {
            DType::Bool | DType::Uint8 => 1,
            DType::Int32 | DType::Float32 => 4,
            DType::Int64 | DType::Float64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DType::Bool => "bool",
            DType::Uint8 => "uint8",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        };
        write!(f, "{s}")
    }
}

/// A type that can be stored in a dataset.
///
/// The `wrap`/`unwrap` functions tie each element type to its variant of
/// [`TypedStorage`], which lets containers hold datasets of different element
/// types in one map.
pub trait Element: Clone + Debug + PartialEq + Send + Sync + 'static {
    const DTYPE: DType;

    fn zero() -> Self;

    /// Write this value into `out`, which is exactly `DTYPE.size()` bytes.
    fn write_le(&self, out: &mut [u8]);

    /// Read a value from `bytes`, which is exactly `DTYPE.size()` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    fn wrap(storage: Storage<Self>) -> TypedStorage;

    fn unwrap_ref(storage: &TypedStorage) -> Option<&Storage<Self>>;

    fn unwrap_mut(storage: &mut TypedStorage) -> Option<&mut Storage<Self>>;
}

macro_rules! impl_element {
    ($t:ty, $dtype:ident, $zero:expr, |$v:ident, $out:ident| $write:expr, |$b:ident| $read:expr) => {
        impl Element for $t {
            const DTYPE: DType = DType::$dtype;

            fn zero() -> Self {
                $zero
            }

            fn write_le(&self, $out: &mut [u8]) {
                let $v = self;
                $write
            }

            fn read_le($b: &[u8]) -> Self {
                $read
            }

            fn wrap(storage: Storage<Self>) -> TypedStorage {
                TypedStorage::$dtype(storage)
            }

            fn unwrap_ref(storage: &TypedStorage) -> Option<&Storage<Self>> {
                match storage {
                    TypedStorage::$dtype(s) => Some(s),
                    _ => None,
                }
            }

            fn unwrap_mut(storage: &mut TypedStorage) -> Option<&mut Storage<Self>> {
                match storage {
                    TypedStorage::$dtype(s) => Some(s),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(bool, Bool, false, |v, out| out[0] = u8::from(*v), |b| b[0] != 0);
impl_element!(u8, Uint8, 0, |v, out| out[0] = *v, |b| b[0]);
impl_element!(
    i32,
    Int32,
    0,
    |v, out| LittleEndian::write_i32(out, *v),
    |b| LittleEndian::read_i32(b)
);
impl_element!(
    i64,
    Int64,
    0,
    |v, out| LittleEndian::write_i64(out, *v),
    |b| LittleEndian::read_i64(b)
);
impl_element!(
    f32,
    Float32,
    0.0,
    |v, out| LittleEndian::write_f32(out, *v),
    |b| LittleEndian::read_f32(b)
);
impl_element!(
    f64,
    Float64,
    0.0,
    |v, out| LittleEndian::write_f64(out, *v),
    |b| LittleEndian::read_f64(b)
);
impl_element!(
    Complex32,
    Complex64,
    Complex32::new(0.0, 0.0),
    |v, out| {
        LittleEndian::write_f32(&mut out[..4], v.re);
        LittleEndian::write_f32(&mut out[4..], v.im);
    },
    |b| Complex32::new(LittleEndian::read_f32(&b[..4]), LittleEndian::read_f32(&b[4..]))
);
impl_element!(
    Complex64,
    Complex128,
    Complex64::new(0.0, 0.0),
    |v, out| {
        LittleEndian::write_f64(&mut out[..8], v.re);
        LittleEndian::write_f64(&mut out[8..], v.im);
    },
    |b| Complex64::new(LittleEndian::read_f64(&b[..8]), LittleEndian::read_f64(&b[8..]))
);

/// Encode values (in iteration order) as little-endian bytes.
pub(crate) fn encode<'a, T: Element>(values: impl ExactSizeIterator<Item = &'a T>) -> Vec<u8> {
    let size = T::DTYPE.size();
    let mut bytes = vec![0; values.len() * size];
    for (out, v) in bytes.chunks_exact_mut(size).zip(values) {
        v.write_le(out);
    }
    bytes
}

/// Decode little-endian bytes into values. Trailing bytes that don't make up a
/// whole element are ignored; callers check lengths beforehand.
pub(crate) fn decode<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::DTYPE.size()).map(T::read_le).collect()
}

/// Run `$body` with `$t` aliased to the Rust type of `$dtype`.
macro_rules! with_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::element::DType::Bool => {
                type $t = bool;
                $body
            }
            $crate::element::DType::Uint8 => {
                type $t = u8;
                $body
            }
            $crate::element::DType::Int32 => {
                type $t = i32;
                $body
            }
            $crate::element::DType::Int64 => {
                type $t = i64;
                $body
            }
            $crate::element::DType::Float32 => {
                type $t = f32;
                $body
            }
            $crate::element::DType::Float64 => {
                type $t = f64;
                $body
            }
            $crate::element::DType::Complex64 => {
                type $t = num_complex::Complex32;
                $body
            }
            $crate::element::DType::Complex128 => {
                type $t = num_complex::Complex64;
                $body
            }
        }
    };
}
pub(crate) use with_dtype;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_complex() {
        let values = [Complex32::new(1.0, -2.0), Complex32::new(0.5, 3.25)];
        let bytes = encode(values.iter());
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], &1.0_f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-2.0_f32).to_le_bytes());
        let back: Vec<Complex32> = decode(&bytes);
        assert_eq!(back, values);
    }

    #[test]
    fn test_bool_encoding() {
        let bytes = encode([true, false, true].iter());
        assert_eq!(bytes, vec![1, 0, 1]);
        assert_eq!(decode::<bool>(&[0, 7]), vec![false, true]);
    }

    #[test]
    fn test_dtype_sizes_match_encoding() {
        fn check<T: Element>() {
            let mut buf = vec![0; T::DTYPE.size()];
            T::zero().write_le(&mut buf);
            assert_eq!(T::read_le(&buf), T::zero());
        }
        check::<bool>();
        check::<u8>();
        check::<i32>();
        check::<i64>();
        check::<f32>();
        check::<f64>();
        check::<Complex32>();
        check::<Complex64>();
    }
}
