//! Attribute values attached to containers, datasets and store groups.

use std::fmt::Display;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Attributes, kept in insertion order.
pub type Attributes = IndexMap<String, AttrValue>;

/// A scalar or small array attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "non_finite")] f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(#[serde(with = "non_finite::vec")] Vec<f64>),
    StrArray(Vec<String>),
}

/// JSON has no NaN or infinity, so these are written as the strings `"NaN"`,
/// `"inf"` and `"-inf"`. Finite values stay plain numbers.
mod non_finite {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Str(String),
    }

    fn to_repr(x: f64) -> Repr {
        if x.is_finite() {
            Repr::Num(x)
        } else if x.is_nan() {
            Repr::Str("NaN".to_string())
        } else if x > 0.0 {
            Repr::Str("inf".to_string())
        } else {
            Repr::Str("-inf".to_string())
        }
    }

    fn from_repr<E: de::Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Num(x) => Ok(x),
            Repr::Str(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(
                    de::Unexpected::Str(other),
                    &"a number, \"NaN\", \"inf\" or \"-inf\"",
                )),
            },
        }
    }

    pub fn serialize<S: Serializer>(x: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        to_repr(*x).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        from_repr(Repr::deserialize(deserializer)?)
    }

    pub mod vec {
        use super::*;

        pub fn serialize<S: Serializer>(v: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(v.iter().map(|&x| to_repr(x)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
            Vec::<Repr>::deserialize(deserializer)?
                .into_iter()
                .map(from_repr)
                .collect()
        }
    }
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str_array(&self) -> Option<&[String]> {
        match self {
            AttrValue::StrArray(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(x) => write!(f, "{x}"),
            AttrValue::Str(s) => write!(f, "{s:?}"),
            AttrValue::IntArray(v) => write!(f, "[{}]", v.iter().join(", ")),
            AttrValue::FloatArray(v) => write!(f, "[{}]", v.iter().join(", ")),
            AttrValue::StrArray(v) => write!(f, "[{}]", v.iter().map(|s| format!("{s:?}")).join(", ")),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::IntArray(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::FloatArray(v)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        AttrValue::StrArray(v)
    }
}

impl From<Vec<&str>> for AttrValue {
    fn from(v: Vec<&str>) -> Self {
        AttrValue::StrArray(v.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_json_is_tagged() {
        let v = AttrValue::FloatArray(vec![1.5, 2.0]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"float_array","value":[1.5,2.0]}"#);
        let back: AttrValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_non_finite_floats_survive_json() {
        let json = serde_json::to_string(&AttrValue::Float(f64::NAN)).unwrap();
        assert_eq!(json, r#"{"type":"float","value":"NaN"}"#);
        match serde_json::from_str(&json).unwrap() {
            AttrValue::Float(x) => assert!(x.is_nan()),
            other => panic!("got {other:?}"),
        }

        let v = AttrValue::FloatArray(vec![f64::INFINITY, 3.0, f64::NEG_INFINITY]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(
            json,
            r#"{"type":"float_array","value":["inf",3.0,"-inf"]}"#
        );
        let back: AttrValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);

        // Integers written by hand still read as floats.
        let back: AttrValue = serde_json::from_str(r#"{"type":"float","value":2}"#).unwrap();
        assert_eq!(back, AttrValue::Float(2.0));
        assert!(serde_json::from_str::<AttrValue>(r#"{"type":"float","value":"big"}"#).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(AttrValue::from("hello").to_string(), "\"hello\"");
        assert_eq!(AttrValue::from(vec![1_i64, 2]).to_string(), "[1, 2]");
    }
}
