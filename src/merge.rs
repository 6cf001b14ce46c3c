//! Pairwise merging of records.
//!
//! Both merge operations mutate the receiver and report whether anything
//! changed. A record of a different type is only ever placed into a field
//! whose declared nested type is exactly that type; everything else is left
//! alone. Same-typed records merge field by field when they do not conflict.
//!
//! ```
//! use layered_records::{chemistry, ContextualRange, Record};
//!
//! let registry = chemistry::registry();
//! let mut mp = Record::of(&registry, "MeltingPoint").unwrap().with("raw_value", "90").unwrap();
//! let water = Record::of(&registry, "Compound").unwrap().with("names", ["H2O"]).unwrap();
//!
//! assert!(mp.merge_contextual(&water, ContextualRange::paragraph()));
//! assert!(!mp.merge_contextual(&water, ContextualRange::paragraph()));
//! assert!(mp.get("apparatus").unwrap().is_none());
//! ```

use crate::contextual_range::ContextualRange;
use crate::error::RecordResult;
use crate::field::{FieldKind, FieldValue, RawValue};
use crate::record::{Record, SELF_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeMode {
    /// Only contextual fields, within each field's contextual range.
    Contextual,
    /// Any field regardless of the contextual flag.
    All,
}

impl Record {
    /// Fill empty contextual fields of this record from `other`, found
    /// `distance` away.
    ///
    /// Returns `false` when this record is already contextually fulfilled,
    /// when binding values conflict, when `other` cannot fit anywhere, or
    /// when an `ignore_when_merging` conflict means both records must be kept.
    pub fn merge_contextual(&mut self, other: &Record, distance: ContextualRange) -> bool {
        self.merge_with(other, distance, MergeMode::Contextual)
    }

    /// Like [`Record::merge_contextual`] but fills any empty field, not just
    /// contextual ones. The no-merge floor, `never_merge` and binding checks
    /// still apply.
    pub fn merge_all(&mut self, other: &Record, distance: ContextualRange) -> bool {
        self.merge_with(other, distance, MergeMode::All)
    }

    fn merge_with(&mut self, other: &Record, distance: ContextualRange, mode: MergeMode) -> bool {
        if mode == MergeMode::Contextual && self.contextual_fulfilled() {
            return false;
        }
        let keep_both = self.should_keep_both(other);

        let mut merged = false;
        if !self.binding_compatible(other) {
            log::debug!(
                "binding conflict between {} and {}",
                self.type_name(),
                other.type_name()
            );
        } else if other.type_id() != self.type_id() {
            if !self.schema().reaches(other.type_id()) {
                log::trace!("{} cannot hold {}", self.type_name(), other.type_name());
                return false;
            }
            merged = self.absorb_nested(other, distance, mode);
        } else if self.is_compatible(other) {
            merged = self.absorb_fields(other, distance, mode);
        }

        self.consolidate_binding();
        if merged {
            if mode == MergeMode::Contextual {
                self.increment_merge_count();
            }
            if let Some(theirs) = other.self_confidence() {
                self.set_self_confidence(lower_confidence(self.self_confidence(), theirs));
            }
            log::debug!(
                "merged {} into {} at {}",
                other.type_name(),
                self.type_name(),
                distance
            );
            if keep_both {
                return false;
            }
        }
        merged
    }

    /// Whether a field at `index` may take a value from `distance` away.
    fn within_reach(&self, index: usize, distance: ContextualRange, mode: MergeMode) -> bool {
        let spec = self.spec(index);
        if spec.never_merge || !(distance > self.no_merge_range_at(index)) {
            return false;
        }
        match mode {
            MergeMode::Contextual => spec.contextual && distance <= spec.contextual_range,
            MergeMode::All => true,
        }
    }

    /// Place a record of another type into the fields declared for it.
    fn absorb_nested(&mut self, other: &Record, distance: ContextualRange, mode: MergeMode) -> bool {
        let mut merged = false;
        for index in 0..self.schema().len() {
            let kind = self.spec(index).kind;
            let is_list = match kind {
                FieldKind::Nested(id) if id == other.type_id() => false,
                FieldKind::ListOfNested(id) if id == other.type_id() => true,
                _ => continue,
            };
            if !self.within_reach(index, distance, mode) {
                continue;
            }

            if self.is_field_empty(index) {
                let raw = if is_list {
                    RawValue::List(vec![RawValue::Record(other.clone())])
                } else {
                    RawValue::Record(other.clone())
                };
                // Assignment goes through the nested type guard.
                match self.assign(index, raw) {
                    Ok(stored) => merged |= stored,
                    Err(err) => log::debug!("could not assign {}: {}", other.type_name(), err),
                }
                continue;
            }

            let Some(value) = self.value_at_mut(index) else {
                continue;
            };
            match mode {
                MergeMode::Contextual => {
                    if let FieldValue::Record(existing) = value {
                        if !existing.contextual_fulfilled() {
                            merged |= existing.merge_contextual(other, distance);
                        }
                    }
                }
                MergeMode::All => {
                    for existing in value.records_mut() {
                        merged |= existing.merge_all(other, distance);
                    }
                }
            }
        }
        merged
    }

    /// Copy empty fields across from a compatible record of the same type.
    fn absorb_fields(&mut self, other: &Record, distance: ContextualRange, mode: MergeMode) -> bool {
        let mut merged = false;
        for index in 0..self.schema().len() {
            if !self.is_field_empty(index) || !self.within_reach(index, distance, mode) {
                continue;
            }
            let Some(value) = other.value_at(index) else {
                continue;
            };
            self.put_value(index, value.clone());
            self.combine_confidence(other, index);
            merged = true;
        }
        merged
    }

    /// Keep the lower of the two confidences for `field`, or adopt `other`'s
    /// when this record has none. `"self"` combines the records' own
    /// confidences.
    pub fn merge_confidence(&mut self, other: &Record, field: &str) -> RecordResult<()> {
        if field == SELF_KEY {
            if let Some(theirs) = other.self_confidence() {
                let combined = lower_confidence(self.self_confidence(), theirs);
                self.set_self_confidence(combined);
            }
            return Ok(());
        }
        let index = self.schema().require(field)?;
        if other.type_id() == self.type_id() {
            self.combine_confidence(other, index);
        }
        Ok(())
    }

    fn combine_confidence(&mut self, other: &Record, index: usize) {
        let Some(theirs) = other.merge_confidence_at(index) else {
            return;
        };
        let combined = lower_confidence(self.merge_confidence_at(index), theirs);
        if let Some(FieldValue::Record(nested)) = self.value_at_mut(index) {
            nested.set_self_confidence(combined);
            return;
        }
        self.set_field_confidence(index, Some(combined));
    }

    fn merge_confidence_at(&self, index: usize) -> Option<f64> {
        match self.value_at(index) {
            Some(FieldValue::Record(nested)) => nested.self_confidence(),
            _ => self.field_confidence(index),
        }
    }

    /// Same type, and no field holds conflicting non-empty values on both
    /// sides. Fields flagged `ignore_when_merging` never conflict. Nested
    /// records are compared with their own compatibility.
    pub fn is_compatible(&self, other: &Record) -> bool {
        if self.type_id() != other.type_id() {
            return false;
        }
        (0..self.schema().len()).all(|index| {
            if self.spec(index).ignore_when_merging {
                return true;
            }
            match (self.value_at(index), other.value_at(index)) {
                (Some(FieldValue::Record(a)), Some(FieldValue::Record(b))) => a.is_compatible(b),
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        })
    }

    /// An `ignore_when_merging` field conflicts, so a merge must keep both.
    pub fn should_keep_both(&self, other: &Record) -> bool {
        if self.type_id() != other.type_id() {
            return false;
        }
        (0..self.schema().len()).any(|index| {
            if !self.spec(index).ignore_when_merging {
                return false;
            }
            match (self.value_at(index), other.value_at(index)) {
                (Some(FieldValue::Record(a)), Some(FieldValue::Record(b))) => !a.is_compatible(b),
                (Some(a), Some(b)) => a != b,
                _ => false,
            }
        })
    }

    /// Same type and every value of `other` is present here too.
    pub fn is_superset(&self, other: &Record) -> bool {
        if self.type_id() != other.type_id() {
            return false;
        }
        (0..self.schema().len()).all(|index| match (self.value_at(index), other.value_at(index)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(FieldValue::Record(a)), Some(FieldValue::Record(b))) => a.is_superset(b),
            (Some(a), Some(b)) => a == b,
        })
    }

    pub fn is_subset(&self, other: &Record) -> bool {
        other.is_superset(self)
    }

    /// Same type, binding-compatible and compatible.
    pub fn can_merge_with(&self, other: &Record) -> bool {
        self.type_id() == other.type_id()
            && self.binding_compatible(other)
            && self.is_compatible(other)
    }

    /// Non-empty binding fields of this record, by name.
    pub fn binding_values(&self) -> Vec<(String, FieldValue)> {
        let schema = self.schema();
        (0..schema.len())
            .filter(|index| schema.spec(*index).binding)
            .filter_map(|index| {
                self.value_at(index)
                    .map(|value| (schema.field_name(index).to_string(), value.clone()))
            })
            .collect()
    }

    /// Whether merging `other` would respect this record's binding values.
    ///
    /// A same-typed `other` must carry identical binding values. A different
    /// type must hold superset- or subset-related values in any field of the
    /// same name, checked recursively through its nested records.
    pub fn binding_compatible(&self, other: &Record) -> bool {
        let binding = self.binding_values();
        if binding.is_empty() {
            return true;
        }
        if self.type_id() == other.type_id() {
            return binding.iter().all(|(name, value)| {
                matches!(other.field(name), Ok(Some(theirs)) if theirs == value)
            });
        }
        binding_consistent(&binding, other)
    }

    /// Copy this record's binding values into nested records that have an
    /// empty field of the same name.
    pub fn consolidate_binding(&mut self) {
        let binding = self.binding_values();
        if binding.is_empty() {
            return;
        }
        for index in 0..self.schema().len() {
            if self.spec(index).binding {
                continue;
            }
            if let Some(value) = self.value_at_mut(index) {
                for nested in value.records_mut() {
                    nested.fill_binding(&binding);
                }
            }
        }
    }

    fn fill_binding(&mut self, binding: &[(String, FieldValue)]) {
        for index in 0..self.schema().len() {
            let name = self.schema().field_name(index).to_string();
            match binding.iter().find(|(n, _)| *n == name) {
                Some((_, value)) => {
                    if self.is_field_empty(index) {
                        if let Err(err) = self.assign(index, RawValue::from(value.clone())) {
                            log::debug!("binding `{}` not consolidated: {}", name, err);
                        }
                    }
                }
                None => {
                    if let Some(value) = self.value_at_mut(index) {
                        for nested in value.records_mut() {
                            nested.fill_binding(binding);
                        }
                    }
                }
            }
        }
    }
}

fn binding_consistent(binding: &[(String, FieldValue)], other: &Record) -> bool {
    if other.is_empty() {
        return true;
    }
    let schema = other.schema();
    for index in 0..schema.len() {
        let Some(theirs) = other.value_at(index) else {
            continue;
        };
        let name = schema.field_name(index);
        match binding.iter().find(|(n, _)| n == name) {
            Some((_, mine)) => {
                let related = match (mine, theirs) {
                    (FieldValue::Record(a), FieldValue::Record(b)) => {
                        a.is_superset(b) || a.is_subset(b)
                    }
                    (FieldValue::Set(a), FieldValue::Set(b)) => a.is_subset(b) || b.is_subset(a),
                    (a, b) => a == b,
                };
                if !related {
                    return false;
                }
            }
            None => {
                if !theirs.records().all(|nested| binding_consistent(binding, nested)) {
                    return false;
                }
            }
        }
    }
    true
}

fn lower_confidence(mine: Option<f64>, theirs: f64) -> f64 {
    match mine {
        Some(mine) if mine < theirs => mine,
        _ => theirs,
    }
}
