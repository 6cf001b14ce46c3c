//! Record instances.
//!
//! A [`Record`] is an instance of a registered record type: one optional value
//! per field, per-field confidences, a merge counter and a provenance marker.
//! Fields are addressed by dotted keypaths. The first segment names a
//! top-level field and later segments descend into a nested record (or into
//! the first element of a nested list).
//!
//! ```
//! use layered_records::{chemistry, Record};
//!
//! let registry = chemistry::registry();
//! let mut mp = Record::of(&registry, "MeltingPoint").unwrap();
//! mp.set("raw_value", "89-90").unwrap();
//! mp.set("compound.names", ["X"]).unwrap();
//!
//! assert_eq!(mp.get_as::<String>("raw_value").unwrap().as_deref(), Some("89-90"));
//! assert!(mp.get("compound.labels").unwrap().is_none());
//! assert!(mp.get("compound.colour").is_err());
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::contextual_range::ContextualRange;
use crate::error::{RecordError, RecordResult};
use crate::field::{FieldKind, FieldSpec, FieldValue, FromFieldValue, RawValue, RecordTypeId};
use crate::pooling::{self, PoolingFn};
use crate::schema::{Registry, Schema};

/// Keypath naming the record's own confidence.
pub const SELF_KEY: &str = "self";

/// An instance of a record type.
#[derive(Clone)]
pub struct Record {
    registry: Arc<Registry>,
    type_id: RecordTypeId,
    values: Vec<Option<FieldValue>>,
    confidences: Vec<Option<f64>>,
    self_confidence: Option<f64>,
    merge_count: u32,
    no_merge_ranges: Vec<Option<ContextualRange>>,
    provenance: Option<usize>,
}

impl Record {
    /// An empty record of type `type_id`.
    ///
    /// Fails with [`RecordError::NotFound`] when `type_id` belongs to another
    /// registry.
    pub fn new(registry: &Arc<Registry>, type_id: RecordTypeId) -> RecordResult<Self> {
        if registry.get(type_id).is_none() {
            return Err(RecordError::NotFound {
                record_type: format!("{:?}", type_id),
                path: String::new(),
            });
        }
        Ok(Self::empty(registry, type_id))
    }

    /// `type_id` must come from `registry`.
    fn empty(registry: &Arc<Registry>, type_id: RecordTypeId) -> Self {
        let len = registry.schema(type_id).len();
        Self {
            registry: Arc::clone(registry),
            type_id,
            values: vec![None; len],
            confidences: vec![None; len],
            self_confidence: None,
            merge_count: 0,
            no_merge_ranges: vec![None; len],
            provenance: None,
        }
    }

    /// An empty record of the type called `name`.
    pub fn of(registry: &Arc<Registry>, name: &str) -> RecordResult<Self> {
        let id = registry.id(name)?;
        Ok(Self::empty(registry, id))
    }

    pub fn type_id(&self) -> RecordTypeId {
        self.type_id
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn schema(&self) -> &Schema {
        self.registry.schema(self.type_id)
    }

    pub fn type_name(&self) -> &str {
        self.schema().name()
    }

    pub(crate) fn spec(&self, index: usize) -> &FieldSpec {
        self.schema().spec(index)
    }

    pub(crate) fn value_at(&self, index: usize) -> Option<&FieldValue> {
        self.values[index].as_ref().filter(|v| !v.is_empty())
    }

    pub(crate) fn value_at_mut(&mut self, index: usize) -> Option<&mut FieldValue> {
        self.values[index].as_mut().filter(|v| !v.is_empty())
    }

    pub(crate) fn is_field_empty(&self, index: usize) -> bool {
        self.value_at(index).is_none()
    }

    /// Store a raw value through the field's processing rule.
    pub(crate) fn assign(&mut self, index: usize, raw: RawValue) -> RecordResult<bool> {
        let processed = {
            let schema = self.schema();
            schema.spec(index).process(schema.field_name(index), raw)?
        };
        let stored = processed.is_some();
        self.values[index] = processed;
        Ok(stored)
    }

    /// Store an already processed value.
    pub(crate) fn put_value(&mut self, index: usize, value: FieldValue) {
        self.values[index] = Some(value);
    }

    pub(crate) fn reset_field(&mut self, index: usize) {
        self.values[index] = None;
        self.confidences[index] = None;
    }

    /// Top-level value of `name`.
    pub fn field(&self, name: &str) -> RecordResult<Option<&FieldValue>> {
        let index = self.schema().require(name)?;
        Ok(self.value_at(index))
    }

    /// Value at a dotted keypath. Unknown segments fail with `NotFound`, an
    /// empty intermediate record gives `Ok(None)`.
    pub fn get(&self, keypath: &str) -> RecordResult<Option<&FieldValue>> {
        let segments: Vec<&str> = keypath.split('.').collect();
        self.check_path(&segments)?;
        Ok(self.walk(&segments))
    }

    /// Typed value at a dotted keypath.
    pub fn get_as<T: FromFieldValue>(&self, keypath: &str) -> RecordResult<Option<T>> {
        Ok(self.get(keypath)?.and_then(T::from_field_value))
    }

    /// Set the value at a dotted keypath, creating empty intermediate records.
    pub fn set(&mut self, keypath: &str, value: impl Into<RawValue>) -> RecordResult<()> {
        let segments: Vec<&str> = keypath.split('.').collect();
        self.check_path(&segments)?;
        self.set_segments(&segments, value.into())
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, keypath: &str, value: impl Into<RawValue>) -> RecordResult<Self> {
        self.set(keypath, value)?;
        Ok(self)
    }

    /// Empty the value at a dotted keypath.
    pub fn clear(&mut self, keypath: &str) -> RecordResult<()> {
        self.set(keypath, RawValue::Null)
    }

    /// Validate a keypath against the schema, independent of current values.
    fn check_path(&self, segments: &[&str]) -> RecordResult<()> {
        let mut schema = self.schema();
        for (depth, segment) in segments.iter().enumerate() {
            let index = schema.index_of(segment).ok_or_else(|| RecordError::NotFound {
                record_type: schema.name().to_string(),
                path: segments.join("."),
            })?;
            if depth + 1 < segments.len() {
                match schema.spec(index).kind.record_type() {
                    Some(target) => schema = self.registry.schema(target),
                    None => {
                        return Err(RecordError::NotFound {
                            record_type: schema.name().to_string(),
                            path: segments.join("."),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    fn walk(&self, segments: &[&str]) -> Option<&FieldValue> {
        let index = self.schema().index_of(segments[0])?;
        let value = self.value_at(index)?;
        if segments.len() == 1 {
            return Some(value);
        }
        value.records().next()?.walk(&segments[1..])
    }

    fn nested_or_default(&mut self, index: usize) -> Option<&mut Record> {
        if self.is_field_empty(index) {
            let target = self.spec(index).kind;
            let created = match target {
                FieldKind::Nested(id) => {
                    FieldValue::Record(Box::new(Record::empty(&self.registry, id)))
                }
                FieldKind::ListOfNested(id) => {
                    FieldValue::Records(vec![Record::empty(&self.registry, id)])
                }
                _ => return None,
            };
            self.values[index] = Some(created);
        }
        self.values[index].as_mut()?.records_mut().next()
    }

    fn set_segments(&mut self, segments: &[&str], raw: RawValue) -> RecordResult<()> {
        let index = self.schema().require(segments[0])?;
        if segments.len() == 1 {
            self.assign(index, raw)?;
            return Ok(());
        }
        let record_type = self.type_name().to_string();
        let nested = self
            .nested_or_default(index)
            .ok_or_else(|| RecordError::NotFound {
                record_type,
                path: segments.join("."),
            })?;
        nested.set_segments(&segments[1..], raw)?;
        if nested.is_empty() {
            self.values[index] = None;
        }
        Ok(())
    }

    /// True when no field holds a value.
    pub fn is_empty(&self) -> bool {
        (0..self.values.len()).all(|i| self.is_field_empty(i))
    }

    pub fn merge_count(&self) -> u32 {
        self.merge_count
    }

    pub(crate) fn increment_merge_count(&mut self) {
        self.merge_count += 1;
    }

    /// Index of the element this record came from, if known.
    pub fn provenance(&self) -> Option<usize> {
        self.provenance
    }

    pub fn set_provenance(&mut self, element: usize) {
        self.provenance = Some(element);
    }

    /// The confidence explicitly assigned to the record itself.
    pub fn self_confidence(&self) -> Option<f64> {
        self.self_confidence
    }

    pub fn set_self_confidence(&mut self, confidence: f64) {
        self.self_confidence = Some(confidence);
    }

    /// Confidence at a keypath. `"self"` gives [`Record::total_confidence`];
    /// a nested record field gives the nested record's total confidence.
    pub fn confidence(&self, keypath: &str) -> RecordResult<Option<f64>> {
        if keypath == SELF_KEY {
            return Ok(Some(self.total_confidence()));
        }
        let segments: Vec<&str> = keypath.split('.').collect();
        self.check_path(&segments)?;
        Ok(self.confidence_segments(&segments))
    }

    fn confidence_segments(&self, segments: &[&str]) -> Option<f64> {
        let index = self.schema().index_of(segments[0])?;
        let value = self.value_at(index)?;
        if segments.len() == 1 {
            return match value {
                FieldValue::Record(nested) => Some(nested.total_confidence()),
                _ => self.confidences[index],
            };
        }
        value.records().next()?.confidence_segments(&segments[1..])
    }

    /// Assign a confidence at a keypath. Empty fields cannot carry one and
    /// are left untouched.
    pub fn set_confidence(&mut self, keypath: &str, confidence: f64) -> RecordResult<()> {
        if keypath == SELF_KEY {
            self.self_confidence = Some(confidence);
            return Ok(());
        }
        let segments: Vec<&str> = keypath.split('.').collect();
        self.check_path(&segments)?;
        self.set_confidence_segments(&segments, confidence);
        Ok(())
    }

    fn set_confidence_segments(&mut self, segments: &[&str], confidence: f64) {
        let Some(index) = self.schema().index_of(segments[0]) else {
            return;
        };
        if segments.len() == 1 {
            if self.is_field_empty(index) {
                log::debug!("ignored confidence for empty field `{}`", segments[0]);
            } else if let Some(FieldValue::Record(nested)) = self.value_at_mut(index) {
                nested.self_confidence = Some(confidence);
            } else {
                self.confidences[index] = Some(confidence);
            }
            return;
        }
        if let Some(nested) = self.value_at_mut(index).and_then(|v| v.records_mut().next()) {
            nested.set_confidence_segments(&segments[1..], confidence);
        }
    }

    pub(crate) fn field_confidence(&self, index: usize) -> Option<f64> {
        self.confidences[index]
    }

    pub(crate) fn set_field_confidence(&mut self, index: usize, confidence: Option<f64>) {
        self.confidences[index] = confidence;
    }

    /// Confidences of the non-empty fields. Nested records contribute their
    /// own total confidence under `pool`.
    pub fn field_confidences(&self, pool: PoolingFn) -> Vec<f64> {
        let mut confidences = Vec::new();
        for index in 0..self.values.len() {
            match self.value_at(index) {
                None => {}
                Some(FieldValue::Record(nested)) => {
                    confidences.push(nested.total_confidence_with(pool))
                }
                Some(FieldValue::Records(nested)) => {
                    confidences.extend(nested.iter().map(|r| r.total_confidence_with(pool)))
                }
                Some(_) => confidences.extend(self.confidences[index]),
            }
        }
        confidences
    }

    /// Total confidence pooled with [`pooling::min_value`].
    pub fn total_confidence(&self) -> f64 {
        self.total_confidence_with(pooling::min_value)
    }

    /// The explicit self confidence if set, otherwise the pooled field
    /// confidences (1.0 when there are none) times the requiredness factor.
    pub fn total_confidence_with(&self, pool: PoolingFn) -> f64 {
        if let Some(confidence) = self.self_confidence {
            return confidence;
        }
        let pooled = pool(&self.field_confidences(pool)).unwrap_or(1.0);
        pooled * self.requiredness_factor()
    }

    /// Product of `1 - requiredness` over empty soft-required fields,
    /// recursing into nested records.
    pub fn requiredness_factor(&self) -> f64 {
        let mut factor = 1.0;
        for index in 0..self.values.len() {
            let spec = self.spec(index);
            match self.value_at(index) {
                None => {
                    if spec.required && spec.requiredness < 1.0 {
                        factor *= 1.0 - spec.requiredness;
                    }
                }
                Some(value) => {
                    for nested in value.records() {
                        factor *= nested.requiredness_factor();
                    }
                }
            }
        }
        factor
    }

    /// Distance below or at which `field` must not be merged.
    pub fn no_merge_range(&self, field: &str) -> RecordResult<ContextualRange> {
        let index = self.schema().require(field)?;
        Ok(self.no_merge_range_at(index))
    }

    pub(crate) fn no_merge_range_at(&self, index: usize) -> ContextualRange {
        self.no_merge_ranges[index].unwrap_or_default()
    }

    pub fn set_no_merge_range(&mut self, field: &str, range: ContextualRange) -> RecordResult<()> {
        let index = self.schema().require(field)?;
        self.no_merge_ranges[index] = Some(range);
        Ok(())
    }

    /// Farthest distance a contextual fill of `field` may come from.
    pub fn contextual_range(&self, field: &str) -> RecordResult<ContextualRange> {
        let index = self.schema().require(field)?;
        Ok(self.spec(index).contextual_range)
    }

    /// Whether every contextual field is filled and every record held in a
    /// contextual nested field is itself contextually fulfilled.
    pub fn contextual_fulfilled(&self) -> bool {
        (0..self.values.len()).all(|index| match self.value_at(index) {
            None => !self.spec(index).contextual,
            Some(FieldValue::Record(nested)) if self.spec(index).contextual => {
                nested.contextual_fulfilled()
            }
            Some(_) => true,
        })
    }

    /// Every hard-required field is filled, recursively.
    pub fn required_fulfilled(&self) -> bool {
        self.required_fulfilled_impl(true)
    }

    /// Like [`Record::required_fulfilled`] but tolerates empty fields that
    /// are both required and contextual.
    pub fn noncontextual_required_fulfilled(&self) -> bool {
        self.required_fulfilled_impl(false)
    }

    fn required_fulfilled_impl(&self, strict: bool) -> bool {
        for index in 0..self.values.len() {
            let spec = self.spec(index);
            if !spec.is_hard_required() || (!strict && spec.contextual) {
                continue;
            }
            match self.value_at(index) {
                None => return false,
                Some(value) => {
                    if !value.records().all(|r| r.required_fulfilled_impl(true)) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Drop nested records that fail their own required check. `strict`
    /// uses [`Record::required_fulfilled`], otherwise the lenient variant.
    pub fn clean(&mut self, strict: bool) {
        for index in 0..self.values.len() {
            let keep = match self.values[index].as_mut() {
                Some(FieldValue::Record(nested)) => {
                    nested.clean(strict);
                    nested.fulfils(strict)
                }
                Some(FieldValue::Records(nested)) => {
                    for record in nested.iter_mut() {
                        record.clean(strict);
                    }
                    nested.retain(|r| r.fulfils(strict));
                    !nested.is_empty()
                }
                _ => true,
            };
            if !keep {
                log::debug!(
                    "cleaned unfulfilled `{}` from {}",
                    self.schema().field_name(index),
                    self.type_name()
                );
                self.reset_field(index);
            }
        }
    }

    fn fulfils(&self, strict: bool) -> bool {
        if strict {
            self.required_fulfilled()
        } else {
            self.noncontextual_required_fulfilled()
        }
    }

    /// This record's type closure.
    pub fn flatten(&self) -> &[RecordTypeId] {
        self.schema().flatten()
    }

    /// This record and every record nested inside it, depth first.
    pub fn flatten_instance(&self) -> Vec<&Record> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_instances(&mut seen, &mut out);
        out
    }

    fn collect_instances<'a>(&'a self, seen: &mut HashSet<*const Record>, out: &mut Vec<&'a Record>) {
        if !seen.insert(self as *const Record) {
            return;
        }
        out.push(self);
        for value in self.values.iter().flatten() {
            for nested in value.records() {
                nested.collect_instances(seen, out);
            }
        }
    }

    /// `{TypeName: {field: value}}` with empty fields omitted unless flagged
    /// `null`. Sets serialize as sorted arrays.
    pub fn serialize(&self) -> Value {
        let schema = self.schema();
        let mut data = Map::new();
        for (index, (name, spec)) in schema.fields().enumerate() {
            match self.value_at(index) {
                Some(value) => {
                    data.insert(name.to_string(), serialize_value(value));
                }
                None if spec.null => {
                    data.insert(name.to_string(), Value::Null);
                }
                None => {}
            }
        }
        let mut record = Map::new();
        record.insert(schema.name().to_string(), Value::Object(data));
        Value::Object(record)
    }

    pub fn to_json(&self) -> String {
        self.serialize().to_string()
    }
}

fn serialize_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Scalar(s) => s.to_json(),
        FieldValue::Record(r) => Record::serialize(r),
        FieldValue::Records(rs) => Value::Array(rs.iter().map(Record::serialize).collect()),
        FieldValue::Set(set) => Value::Array(set.iter().map(|s| s.to_json()).collect()),
        FieldValue::List(list) => Value::Array(list.iter().map(|s| s.to_json()).collect()),
    }
}

impl Registry {
    /// Rebuild a record from the output of [`Record::serialize`].
    pub fn deserialize(registry: &Arc<Registry>, value: &Value) -> RecordResult<Record> {
        let invalid = |reason: &str| RecordError::InvalidValue {
            field: String::new(),
            reason: reason.to_string(),
        };
        let object = value
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| invalid("expected an object with a single type name key"))?;
        let (type_name, fields) = object
            .iter()
            .next()
            .ok_or_else(|| invalid("expected a type name"))?;
        let fields = fields
            .as_object()
            .ok_or_else(|| invalid("expected an object of fields"))?;

        let mut record = Record::of(registry, type_name)?;
        for (name, field_value) in fields {
            let index = record.schema().require(name)?;
            let raw = match record.spec(index).kind {
                FieldKind::Nested(_) if !field_value.is_null() => {
                    RawValue::Record(Registry::deserialize(registry, field_value)?)
                }
                FieldKind::ListOfNested(_) => match field_value {
                    Value::Array(items) => RawValue::List(
                        items
                            .iter()
                            .map(|item| Registry::deserialize(registry, item).map(RawValue::Record))
                            .collect::<RecordResult<Vec<_>>>()?,
                    ),
                    Value::Null => RawValue::Null,
                    single => RawValue::Record(Registry::deserialize(registry, single)?),
                },
                _ => raw_from_json(field_value),
            };
            record.assign(index, raw)?;
        }
        Ok(record)
    }
}

fn raw_from_json(value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Boolean(*b),
        Value::Number(n) => n.as_f64().map_or(RawValue::Null, RawValue::Number),
        Value::String(s) => RawValue::Text(s.clone()),
        Value::Array(items) => RawValue::List(items.iter().map(raw_from_json).collect()),
        Value::Object(map) => RawValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), raw_from_json(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

impl PartialEq for Record {
    /// Structural: same type and equal field values.
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
            && (0..self.values.len()).all(|i| self.value_at(i) == other.value_at(i))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value: Value = Record::serialize(self);
        value.serialize(serializer)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())?;
        if let Some(confidence) = self.self_confidence {
            write!(f, " ({:.2})", confidence)?;
        }
        Ok(())
    }
}
