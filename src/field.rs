//! Field kinds, field specifications and value processing.
//!
//! A [`FieldSpec`] describes one field of a record type: what kind of value it
//! holds and the flags that steer merging. Raw input arrives as a [`RawValue`]
//! and is converted with [`FieldSpec::process`] into a typed [`FieldValue`].
//!
//! Nested kinds are strict. A record whose type is not exactly the declared
//! nested type is rejected and the field stays empty:
//!
//! ```
//! use layered_records::{chemistry, Record};
//!
//! let registry = chemistry::registry();
//! let compound = Record::of(&registry, "Compound").unwrap().with("names", ["H2O"]).unwrap();
//! let mut mp = Record::of(&registry, "MeltingPoint").unwrap();
//!
//! mp.set("apparatus", compound).unwrap();
//! assert!(mp.get("apparatus").unwrap().is_none());
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contextual_range::ContextualRange;
use crate::error::{RecordError, RecordResult};
use crate::record::Record;

/// Identifies a record type inside one [`Registry`](crate::Registry).
///
/// Ids carry the id of the registry that handed them out, so a kind that
/// points at another registry's type can be detected at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordTypeId {
    pub(crate) registry: u64,
    pub(crate) index: u32,
}

impl RecordTypeId {
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Text,
    Number,
    Boolean,
}

/// What a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Nested(RecordTypeId),
    ListOfNested(RecordTypeId),
    SetOfScalar(ScalarKind),
    ListOfScalar(ScalarKind),
}

impl FieldKind {
    /// The record type of a `Nested` or `ListOfNested` kind.
    pub fn record_type(&self) -> Option<RecordTypeId> {
        match self {
            FieldKind::Nested(id) | FieldKind::ListOfNested(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_nested(&self) -> bool {
        self.record_type().is_some()
    }
}

/// Static description of one field of a record type.
///
/// Built with the kind constructors and chained flag setters:
///
/// ```
/// use layered_records::{ContextualRange, FieldSpec};
///
/// let spec = FieldSpec::text()
///     .required()
///     .contextual()
///     .contextual_range(ContextualRange::paragraph() * 2.0);
/// assert!(spec.required && spec.contextual);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub required: bool,
    /// Weight in `[0, 1]`. Below `1.0` an empty required field discounts
    /// confidence instead of failing the record.
    pub requiredness: f64,
    /// May be filled from another document element.
    pub contextual: bool,
    /// Farthest distance a contextual fill may come from.
    pub contextual_range: ContextualRange,
    /// Identifies which entity the record is about.
    pub binding: bool,
    pub never_merge: bool,
    /// Conflicts do not block a merge but both records are kept.
    pub ignore_when_merging: bool,
    /// Serialize as `null` when empty instead of omitting the field.
    pub null: bool,
    /// The field's match pattern may be widened during a document pass.
    pub updatable: bool,
    /// Base regular expression for the widening hook.
    pub pattern: Option<String>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            requiredness: 1.0,
            contextual: false,
            contextual_range: ContextualRange::document(),
            binding: false,
            never_merge: false,
            ignore_when_merging: false,
            null: false,
            updatable: false,
            pattern: None,
        }
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Scalar(ScalarKind::Text))
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Scalar(ScalarKind::Number))
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Scalar(ScalarKind::Boolean))
    }

    pub fn nested(record_type: RecordTypeId) -> Self {
        Self::new(FieldKind::Nested(record_type))
    }

    pub fn list_of(record_type: RecordTypeId) -> Self {
        Self::new(FieldKind::ListOfNested(record_type))
    }

    pub fn set_of(kind: ScalarKind) -> Self {
        Self::new(FieldKind::SetOfScalar(kind))
    }

    pub fn list_of_scalar(kind: ScalarKind) -> Self {
        Self::new(FieldKind::ListOfScalar(kind))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field required with a soft weight, clamped to `[0, 1]`.
    pub fn requiredness(mut self, weight: f64) -> Self {
        self.required = true;
        self.requiredness = weight.clamp(0.0, 1.0);
        self
    }

    pub fn contextual(mut self) -> Self {
        self.contextual = true;
        self
    }

    pub fn contextual_range(mut self, range: ContextualRange) -> Self {
        self.contextual_range = range;
        self
    }

    pub fn binding(mut self) -> Self {
        self.binding = true;
        self
    }

    pub fn never_merge(mut self) -> Self {
        self.never_merge = true;
        self
    }

    pub fn ignore_when_merging(mut self) -> Self {
        self.ignore_when_merging = true;
        self
    }

    pub fn null(mut self) -> Self {
        self.null = true;
        self
    }

    pub fn updatable(mut self) -> Self {
        self.updatable = true;
        self
    }

    pub fn pattern(mut self, source: impl Into<String>) -> Self {
        self.pattern = Some(source.into());
        self
    }

    /// Whether `required` with full weight, so an empty value fails the record.
    pub fn is_hard_required(&self) -> bool {
        self.required && self.requiredness >= 1.0
    }

    /// Convert a raw value into this field's typed value.
    ///
    /// `Ok(None)` means the field ends up empty. That covers explicit nulls,
    /// empty collections, and every nested value whose record type is not
    /// exactly the declared one.
    pub fn process(&self, field: &str, raw: RawValue) -> RecordResult<Option<FieldValue>> {
        if raw.is_null() {
            return Ok(None);
        }
        let value = match self.kind {
            FieldKind::Scalar(kind) => Some(FieldValue::Scalar(kind.process(field, raw)?)),
            FieldKind::Nested(expected) => match raw {
                RawValue::Record(record) if record.type_id() == expected => {
                    Some(FieldValue::Record(Box::new(record)))
                }
                other => {
                    log::debug!(
                        "rejected {} for nested field `{}`: expected {:?}",
                        other.describe(),
                        field,
                        expected
                    );
                    None
                }
            },
            FieldKind::ListOfNested(expected) => {
                let items = match raw {
                    RawValue::List(items) => items,
                    single => vec![single],
                };
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        RawValue::Record(record) if record.type_id() == expected => {
                            records.push(record)
                        }
                        other => log::debug!(
                            "dropped {} from nested list `{}`: expected {:?}",
                            other.describe(),
                            field,
                            expected
                        ),
                    }
                }
                Some(FieldValue::Records(records))
            }
            FieldKind::SetOfScalar(kind) => {
                let mut set = BTreeSet::new();
                for item in raw.into_items() {
                    if !item.is_null() {
                        set.insert(kind.process(field, item)?);
                    }
                }
                Some(FieldValue::Set(set))
            }
            FieldKind::ListOfScalar(kind) => {
                let mut list = Vec::new();
                for item in raw.into_items() {
                    if !item.is_null() {
                        list.push(kind.process(field, item)?);
                    }
                }
                Some(FieldValue::List(list))
            }
        };
        Ok(value.filter(|v| !v.is_empty()))
    }
}

impl ScalarKind {
    fn process(self, field: &str, raw: RawValue) -> RecordResult<Scalar> {
        let invalid = |reason: String| RecordError::InvalidValue {
            field: field.to_string(),
            reason,
        };
        match (self, raw) {
            (ScalarKind::Text, RawValue::Text(s)) => Ok(Scalar::Text(s)),
            (ScalarKind::Text, RawValue::Number(n)) => Ok(Scalar::Text(n.to_string())),
            (ScalarKind::Text, RawValue::Boolean(b)) => Ok(Scalar::Text(b.to_string())),
            (ScalarKind::Number, RawValue::Number(n)) => Ok(Scalar::Number(n)),
            (ScalarKind::Number, RawValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Scalar::Number)
                .map_err(|_| invalid(format!("`{}` is not a number", s))),
            (ScalarKind::Number, RawValue::Boolean(b)) => {
                Ok(Scalar::Number(if b { 1.0 } else { 0.0 }))
            }
            (ScalarKind::Boolean, RawValue::Boolean(b)) => Ok(Scalar::Boolean(b)),
            (ScalarKind::Boolean, RawValue::Number(n)) => Ok(Scalar::Boolean(n != 0.0)),
            (ScalarKind::Boolean, RawValue::Text(s)) => {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Ok(Scalar::Boolean(true)),
                    "false" | "no" | "0" => Ok(Scalar::Boolean(false)),
                    _ => Err(invalid(format!("`{}` is not a boolean", s))),
                }
            }
            (kind, other) => Err(invalid(format!(
                "cannot convert {} to {:?}",
                other.describe(),
                kind
            ))),
        }
    }
}

/// A primitive field value.
#[derive(Debug, Clone)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.is_empty())
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Text(s) => serde_json::Value::String(s.clone()),
            Scalar::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Scalar::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Scalar::Text(_) => 0,
            Scalar::Number(_) => 1,
            Scalar::Boolean(_) => 2,
        }
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            (Scalar::Number(a), Scalar::Number(b)) => a.total_cmp(b),
            (Scalar::Boolean(a), Scalar::Boolean(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

/// A processed, typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Scalar),
    Record(Box<Record>),
    Records(Vec<Record>),
    Set(BTreeSet<Scalar>),
    List(Vec<Scalar>),
}

impl FieldValue {
    /// Empty text, sets, lists and records with no values are all empty.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Scalar(s) => s.is_empty(),
            FieldValue::Record(r) => r.is_empty(),
            FieldValue::Records(rs) => rs.is_empty(),
            FieldValue::Set(s) => s.is_empty(),
            FieldValue::List(l) => l.is_empty(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_text)
    }

    pub fn as_number(&self) -> Option<f64> {
        self.as_scalar().and_then(Scalar::as_number)
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            FieldValue::Records(rs) => Some(rs),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<Scalar>> {
        match self {
            FieldValue::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            FieldValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Nested records held by this value, in order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        let slice: &[Record] = match self {
            FieldValue::Record(r) => std::slice::from_ref(&**r),
            FieldValue::Records(rs) => rs,
            _ => &[],
        };
        slice.iter()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        let slice: &mut [Record] = match self {
            FieldValue::Record(r) => std::slice::from_mut(&mut **r),
            FieldValue::Records(rs) => rs,
            _ => &mut [],
        };
        slice.iter_mut()
    }
}

/// Typed extraction from a [`FieldValue`], used by [`Record::get_as`].
pub trait FromFieldValue: Sized {
    fn from_field_value(value: &FieldValue) -> Option<Self>;
}

impl FromFieldValue for String {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_text().map(str::to_string)
    }
}

impl FromFieldValue for f64 {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_number()
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_scalar().and_then(Scalar::as_bool)
    }
}

impl FromFieldValue for Record {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_record().cloned()
    }
}

impl FromFieldValue for Vec<Record> {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_records().map(<[Record]>::to_vec)
    }
}

impl FromFieldValue for BTreeSet<Scalar> {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value.as_set().cloned()
    }
}

impl FromFieldValue for BTreeSet<String> {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value
            .as_set()
            .map(|set| set.iter().map(|s| s.to_string()).collect())
    }
}

impl FromFieldValue for Vec<f64> {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        value
            .as_list()
            .map(|list| list.iter().filter_map(Scalar::as_number).collect())
    }
}

/// Unprocessed input for [`Record::set`].
#[derive(Debug, Clone)]
pub enum RawValue {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
    List(Vec<RawValue>),
    Map(BTreeMap<String, RawValue>),
    Record(Record),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    fn into_items(self) -> Vec<RawValue> {
        match self {
            RawValue::List(items) => items,
            single => vec![single],
        }
    }

    fn describe(&self) -> String {
        match self {
            RawValue::Null => "null".to_string(),
            RawValue::Text(_) => "text".to_string(),
            RawValue::Number(_) => "number".to_string(),
            RawValue::Boolean(_) => "boolean".to_string(),
            RawValue::List(_) => "list".to_string(),
            RawValue::Map(_) => "map".to_string(),
            RawValue::Record(r) => format!("record `{}`", r.type_name()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Boolean(value)
    }
}

impl From<Record> for RawValue {
    fn from(value: Record) -> Self {
        RawValue::Record(value)
    }
}

impl From<Scalar> for RawValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => RawValue::Text(s),
            Scalar::Number(n) => RawValue::Number(n),
            Scalar::Boolean(b) => RawValue::Boolean(b),
        }
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(value: Vec<T>) -> Self {
        RawValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RawValue>, const N: usize> From<[T; N]> for RawValue {
    fn from(value: [T; N]) -> Self {
        RawValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawValue::Null, Into::into)
    }
}

impl From<BTreeMap<String, RawValue>> for RawValue {
    fn from(value: BTreeMap<String, RawValue>) -> Self {
        RawValue::Map(value)
    }
}

impl From<FieldValue> for RawValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Scalar(s) => s.into(),
            FieldValue::Record(r) => RawValue::Record(*r),
            FieldValue::Records(rs) => rs.into(),
            FieldValue::Set(set) => set.into_iter().collect::<Vec<_>>().into(),
            FieldValue::List(list) => list.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(kind: FieldKind) -> FieldSpec {
        FieldSpec::new(kind)
    }

    #[test]
    fn test_scalar_conversions() {
        let number = FieldSpec::number();
        assert_eq!(
            number.process("value", "89.5".into()).unwrap(),
            Some(FieldValue::Scalar(Scalar::Number(89.5)))
        );
        let err = number.process("value", "abc".into()).unwrap_err();
        assert!(matches!(err, RecordError::InvalidValue { .. }));

        let text = FieldSpec::text();
        assert_eq!(
            text.process("units", 3.0.into()).unwrap(),
            Some(FieldValue::Scalar(Scalar::Text("3".to_string())))
        );
        assert_eq!(text.process("units", "".into()).unwrap(), None);
        assert_eq!(text.process("units", RawValue::Null).unwrap(), None);
    }

    #[test]
    fn test_set_processes_each_element() {
        let spec = field_of(FieldKind::SetOfScalar(ScalarKind::Text));
        let value = spec
            .process("names", vec!["b", "a", "b"].into())
            .unwrap()
            .unwrap();
        let items: Vec<String> = value.as_set().unwrap().iter().map(|s| s.to_string()).collect();
        assert_eq!(items, vec!["a", "b"]);

        // A bare scalar becomes a singleton set.
        let single = spec.process("names", "c".into()).unwrap().unwrap();
        assert_eq!(single.as_set().unwrap().len(), 1);

        assert_eq!(spec.process("names", Vec::<String>::new().into()).unwrap(), None);
    }

    #[test]
    fn test_list_of_scalar_keeps_order() {
        let spec = FieldSpec::list_of_scalar(ScalarKind::Number);
        let value = spec
            .process("value", vec![90.0, 89.0].into())
            .unwrap()
            .unwrap();
        assert_eq!(
            Vec::<f64>::from_field_value(&value).unwrap(),
            vec![90.0, 89.0]
        );
    }

    #[test]
    fn test_scalar_order_is_total() {
        let mut values = vec![
            Scalar::Number(2.0),
            Scalar::Text("b".into()),
            Scalar::Number(-1.0),
            Scalar::Text("a".into()),
        ];
        values.sort();
        let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, vec!["a", "b", "-1", "2"]);
    }

    #[test]
    fn test_requiredness_marks_required_and_clamps() {
        let spec = FieldSpec::text().requiredness(1.5);
        assert!(spec.required);
        assert_eq!(spec.requiredness, 1.0);
        assert!(spec.is_hard_required());

        let soft = FieldSpec::text().requiredness(0.5);
        assert!(!soft.is_hard_required());
    }
}
