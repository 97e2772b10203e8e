//! Named axes.
//!
//! An [`Axis`] is a named dimension with a length and, optionally, a label for
//! every index (frequencies, timestamps, input names...). Axes are immutable;
//! anything that "changes" an axis returns a new one, so containers share axes
//! behind an `Arc` without any coordination.

#[cfg(test)]
mod tests;

use std::{fmt::Display, ops::Range};

use hifitime::Epoch;
use itertools::Itertools;
use vec1::Vec1;

use crate::{attrs::AttrValue, error::SchemaError};

/// The labels of an axis, one per index.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisLabels {
    Int(Vec1<i64>),
    Float(Vec1<f64>),
    Str(Vec1<String>),
}

/// A single axis label, used to select by value rather than by index.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Int(i) => write!(f, "{i}"),
            Label::Float(x) => write!(f, "{x}"),
            Label::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Label {
    fn from(v: i64) -> Self {
        Label::Int(v)
    }
}

impl From<f64> for Label {
    fn from(v: f64) -> Self {
        Label::Float(v)
    }
}

impl From<&str> for Label {
    fn from(v: &str) -> Self {
        Label::Str(v.to_string())
    }
}

impl AxisLabels {
    pub fn len(&self) -> usize {
        match self {
            AxisLabels::Int(v) => v.len(),
            AxisLabels::Float(v) => v.len(),
            AxisLabels::Str(v) => v.len(),
        }
    }

    /// Labels for a time axis. Timestamps are stored as Unix seconds.
    pub fn from_epochs(epochs: &Vec1<Epoch>) -> AxisLabels {
        AxisLabels::Float(epochs.mapped_ref(|e| e.to_unix_seconds()))
    }

    pub fn get(&self, index: usize) -> Option<Label> {
        match self {
            AxisLabels::Int(v) => v.get(index).map(|&i| Label::Int(i)),
            AxisLabels::Float(v) => v.get(index).map(|&x| Label::Float(x)),
            AxisLabels::Str(v) => v.get(index).map(|s| Label::Str(s.clone())),
        }
    }

    /// The index of the first occurrence of `label`.
    pub fn position(&self, label: &Label) -> Option<usize> {
        match (self, label) {
            (AxisLabels::Int(v), Label::Int(l)) => v.iter().position(|x| x == l),
            (AxisLabels::Float(v), Label::Float(l)) => v.iter().position(|x| x == l),
            (AxisLabels::Str(v), Label::Str(l)) => v.iter().position(|x| x == l),
            _ => None,
        }
    }

    /// `None` if `indices` is empty. Indices must be in range.
    fn select(&self, indices: &[usize]) -> Option<AxisLabels> {
        let labels = match self {
            AxisLabels::Int(v) => AxisLabels::Int(Vec1::try_from_vec(
                indices.iter().map(|&i| v[i]).collect(),
            )
            .ok()?),
            AxisLabels::Float(v) => AxisLabels::Float(
                Vec1::try_from_vec(indices.iter().map(|&i| v[i]).collect()).ok()?,
            ),
            AxisLabels::Str(v) => AxisLabels::Str(
                Vec1::try_from_vec(indices.iter().map(|&i| v[i].clone()).collect()).ok()?,
            ),
        };
        Some(labels)
    }

    /// `None` if the label kinds differ.
    fn concat(&self, other: &AxisLabels) -> Option<AxisLabels> {
        let labels = match (self, other) {
            (AxisLabels::Int(a), AxisLabels::Int(b)) => {
                AxisLabels::Int(Vec1::try_from_vec(a.iter().chain(b.iter()).copied().collect()).ok()?)
            }
            (AxisLabels::Float(a), AxisLabels::Float(b)) => AxisLabels::Float(
                Vec1::try_from_vec(a.iter().chain(b.iter()).copied().collect()).ok()?,
            ),
            (AxisLabels::Str(a), AxisLabels::Str(b)) => AxisLabels::Str(
                Vec1::try_from_vec(a.iter().chain(b.iter()).cloned().collect()).ok()?,
            ),
            _ => return None,
        };
        Some(labels)
    }

    fn to_attr(&self) -> AttrValue {
        match self {
            AxisLabels::Int(v) => AttrValue::IntArray(v.to_vec()),
            AxisLabels::Float(v) => AttrValue::FloatArray(v.to_vec()),
            AxisLabels::Str(v) => AttrValue::StrArray(v.to_vec()),
        }
    }
}

/// What an axis is defined from: a bare length or a label sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisDef {
    Len(usize),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl From<usize> for AxisDef {
    fn from(v: usize) -> Self {
        AxisDef::Len(v)
    }
}

impl From<Vec<i64>> for AxisDef {
    fn from(v: Vec<i64>) -> Self {
        AxisDef::Int(v)
    }
}

impl From<Vec<f64>> for AxisDef {
    fn from(v: Vec<f64>) -> Self {
        AxisDef::Float(v)
    }
}

impl From<Vec<String>> for AxisDef {
    fn from(v: Vec<String>) -> Self {
        AxisDef::Str(v)
    }
}

impl From<Vec<&str>> for AxisDef {
    fn from(v: Vec<&str>) -> Self {
        AxisDef::Str(v.into_iter().map(|s| s.to_string()).collect())
    }
}

impl From<AxisLabels> for AxisDef {
    fn from(v: AxisLabels) -> Self {
        match v {
            AxisLabels::Int(v) => AxisDef::Int(v.into_vec()),
            AxisLabels::Float(v) => AxisDef::Float(v.into_vec()),
            AxisLabels::Str(v) => AxisDef::Str(v.into_vec()),
        }
    }
}

/// A way of picking elements out of an axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Indices, in the order they should appear in the result.
    Indices(Vec<usize>),
    Range(Range<usize>),
    /// Labels, in the order they should appear in the result.
    Labels(Vec<Label>),
}

impl From<Vec<usize>> for Selection {
    fn from(v: Vec<usize>) -> Self {
        Selection::Indices(v)
    }
}

impl From<&[usize]> for Selection {
    fn from(v: &[usize]) -> Self {
        Selection::Indices(v.to_vec())
    }
}

impl From<Range<usize>> for Selection {
    fn from(v: Range<usize>) -> Self {
        Selection::Range(v)
    }
}

impl From<Vec<Label>> for Selection {
    fn from(v: Vec<Label>) -> Self {
        Selection::Labels(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    name: String,
    len: usize,
    labels: Option<AxisLabels>,
}

impl Axis {
    /// Define an axis from a length or a sequence of labels. Zero-length axes
    /// aren't allowed.
    pub fn define<S: Into<String>, D: Into<AxisDef>>(name: S, def: D) -> Result<Axis, SchemaError> {
        let name = name.into();
        let empty = || SchemaError::EmptyAxis { name: name.clone() };
        let (len, labels) = match def.into() {
            AxisDef::Len(0) => return Err(empty()),
            AxisDef::Len(n) => (n, None),
            AxisDef::Int(v) => {
                let v = Vec1::try_from_vec(v).map_err(|_| empty())?;
                (v.len(), Some(AxisLabels::Int(v)))
            }
            AxisDef::Float(v) => {
                let v = Vec1::try_from_vec(v).map_err(|_| empty())?;
                (v.len(), Some(AxisLabels::Float(v)))
            }
            AxisDef::Str(v) => {
                let v = Vec1::try_from_vec(v).map_err(|_| empty())?;
                (v.len(), Some(AxisLabels::Str(v)))
            }
        };
        Ok(Axis { name, len, labels })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn labels(&self) -> Option<&AxisLabels> {
        self.labels.as_ref()
    }

    /// Names equal, and either lengths equal or label sequences equal.
    pub fn is_compatible(&self, other: &Axis) -> bool {
        self.name == other.name
            && (self.len == other.len
                || matches!((&self.labels, &other.labels), (Some(a), Some(b)) if a == b))
    }

    /// A new axis with `other`'s elements following this one's.
    pub fn concat(&self, other: &Axis) -> Result<Axis, SchemaError> {
        if self.name != other.name {
            return Err(SchemaError::AxisNameMismatch {
                a: self.name.clone(),
                b: other.name.clone(),
            });
        }
        let labels = match (&self.labels, &other.labels) {
            (None, None) => None,
            (Some(a), Some(b)) => Some(a.concat(b).ok_or_else(|| SchemaError::AxisLabelMismatch {
                name: self.name.clone(),
                reason: "the label types differ",
            })?),
            _ => {
                return Err(SchemaError::AxisLabelMismatch {
                    name: self.name.clone(),
                    reason: "only one of the axes is labelled",
                })
            }
        };
        Ok(Axis {
            name: self.name.clone(),
            len: self.len + other.len,
            labels,
        })
    }

    /// Turn a selection into indices of this axis.
    pub fn resolve(&self, selection: &Selection) -> Result<Vec<usize>, SchemaError> {
        let out_of_bounds = |index| SchemaError::SelectionOutOfBounds {
            axis: self.name.clone(),
            index,
            len: self.len,
        };
        match selection {
            Selection::Indices(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= self.len) {
                    return Err(out_of_bounds(bad));
                }
                Ok(indices.clone())
            }
            Selection::Range(range) => {
                if range.end > self.len && !range.is_empty() {
                    return Err(out_of_bounds(range.end - 1));
                }
                Ok(range.clone().collect())
            }
            Selection::Labels(labels) => labels
                .iter()
                .map(|label| {
                    self.labels
                        .as_ref()
                        .and_then(|l| l.position(label))
                        .ok_or_else(|| SchemaError::UnknownLabel {
                            axis: self.name.clone(),
                            label: label.to_string(),
                        })
                })
                .collect(),
        }
    }

    /// A new axis holding only the elements at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Result<Axis, SchemaError> {
        if indices.is_empty() {
            return Err(SchemaError::EmptyAxis {
                name: self.name.clone(),
            });
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len) {
            return Err(SchemaError::SelectionOutOfBounds {
                axis: self.name.clone(),
                index: bad,
                len: self.len,
            });
        }
        Ok(Axis {
            name: self.name.clone(),
            len: indices.len(),
            labels: self.labels.as_ref().and_then(|l| l.select(indices)),
        })
    }

    /// The form in which this axis is persisted: its labels, or just its
    /// length.
    pub fn to_attr(&self) -> AttrValue {
        match &self.labels {
            Some(l) => l.to_attr(),
            None => AttrValue::Int(self.len as i64),
        }
    }

    pub fn from_attr<S: Into<String>>(name: S, value: &AttrValue) -> Result<Axis, SchemaError> {
        let name = name.into();
        let def = match value {
            AttrValue::Int(n) if *n > 0 => AxisDef::Len(*n as usize),
            AttrValue::IntArray(v) => AxisDef::Int(v.clone()),
            AttrValue::FloatArray(v) => AxisDef::Float(v.clone()),
            AttrValue::StrArray(v) => AxisDef::Str(v.clone()),
            _ => {
                return Err(SchemaError::BadAxisMetadata {
                    axis: name,
                    what: "index map",
                })
            }
        };
        Axis::define(name, def)
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.len)?;
        if let Some(labels) = &self.labels {
            let shown = (0..labels.len().min(4))
                .filter_map(|i| labels.get(i))
                .join(", ");
            let ellipsis = if labels.len() > 4 { ", ..." } else { "" };
            write!(f, ": [{shown}{ellipsis}]")?;
        }
        Ok(())
    }
}

/// True iff the axes have the same name, and their lengths or labels agree.
pub fn compatible(a: &Axis, b: &Axis) -> bool {
    a.is_compatible(b)
}

/// Join two axes of the same name end to end.
pub fn concat(a: &Axis, b: &Axis) -> Result<Axis, SchemaError> {
    a.concat(b)
}
