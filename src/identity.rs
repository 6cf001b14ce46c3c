//! Identity records: names, labels and roles of the entity a record is about.
//!
//! An identity type is declared with [`SchemaBuilder::identity`]. Every other
//! type may carry an identity field, the first nested field whose type is an
//! identity type. These helpers answer the identity questions the document
//! driver asks.
//!
//! [`SchemaBuilder::identity`]: crate::SchemaBuilder::identity

use std::collections::BTreeSet;

use crate::error::RecordResult;
use crate::field::{FieldValue, RawValue, Scalar};
use crate::record::Record;
use crate::schema::IdentityFields;

/// Role marking a compound as the product of a synthesis.
pub const PRODUCT_ROLE: &str = "product";

impl Record {
    pub fn is_identity_type(&self) -> bool {
        self.schema().is_identity()
    }

    fn identity_set(&self, pick: impl Fn(IdentityFields) -> usize) -> BTreeSet<String> {
        self.schema()
            .identity()
            .and_then(|fields| self.value_at(pick(fields)))
            .and_then(FieldValue::as_set)
            .map(|set| set.iter().map(Scalar::to_string).collect())
            .unwrap_or_default()
    }

    /// Names of an identity record. Empty for other types.
    pub fn names(&self) -> BTreeSet<String> {
        self.identity_set(|f| f.names)
    }

    pub fn labels(&self) -> BTreeSet<String> {
        self.identity_set(|f| f.labels)
    }

    pub fn roles(&self) -> BTreeSet<String> {
        self.identity_set(|f| f.roles)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().contains(role)
    }

    /// An identity record with a name or label and nothing but identity fields.
    pub fn is_identity_only(&self) -> bool {
        let Some(fields) = self.schema().identity() else {
            return false;
        };
        let only_identity = (0..self.schema().len()).all(|index| {
            index == fields.names
                || index == fields.labels
                || index == fields.roles
                || self.is_field_empty(index)
        });
        only_identity && !(self.is_field_empty(fields.names) && self.is_field_empty(fields.labels))
    }

    /// Whether the record lacks identifying information.
    ///
    /// Identity records are unidentified without names and labels. Other
    /// records are unidentified when their identity field is empty or holds
    /// an unidentified identity. Types without an identity field never are.
    pub fn is_unidentified(&self) -> bool {
        if self.is_identity_type() {
            return self.names().is_empty() && self.labels().is_empty();
        }
        match self.schema().identity_field() {
            None => false,
            Some(index) => match self.value_at(index).and_then(FieldValue::as_record) {
                None => true,
                Some(identity) => identity.is_unidentified(),
            },
        }
    }

    /// The record's identity: itself for identity types, else the nested
    /// identity field's value.
    pub fn identity_record(&self) -> Option<&Record> {
        if self.is_identity_type() {
            return Some(self);
        }
        let index = self.schema().identity_field()?;
        self.value_at(index).and_then(FieldValue::as_record)
    }

    pub fn identity_record_mut(&mut self) -> Option<&mut Record> {
        if self.is_identity_type() {
            return Some(self);
        }
        let index = self.schema().identity_field()?;
        self.value_at_mut(index).and_then(FieldValue::as_record_mut)
    }

    /// Fill the identity field with `identity`. Records of the wrong type
    /// leave the field empty.
    pub fn assign_identity(&mut self, identity: Record) -> RecordResult<bool> {
        match self.schema().identity_field() {
            Some(index) => self.assign(index, RawValue::Record(identity)),
            None => Ok(false),
        }
    }

    /// Add every name, label and role of `other` to this identity record.
    /// Returns whether anything was added.
    pub fn union_identity(&mut self, other: &Record) -> bool {
        let (Some(fields), Some(other_fields)) = (self.schema().identity(), other.schema().identity())
        else {
            return false;
        };
        let mut changed = false;
        for (mine, theirs) in [
            (fields.names, other_fields.names),
            (fields.labels, other_fields.labels),
            (fields.roles, other_fields.roles),
        ] {
            changed |= self.extend_set(mine, other.value_at(theirs));
        }
        changed
    }

    /// Add a name to an identity record. Returns whether it was new.
    pub fn add_name(&mut self, name: &str) -> bool {
        match self.schema().identity() {
            Some(fields) => {
                let item = FieldValue::Set(BTreeSet::from([Scalar::from(name)]));
                self.extend_set(fields.names, Some(&item))
            }
            None => false,
        }
    }

    fn extend_set(&mut self, index: usize, incoming: Option<&FieldValue>) -> bool {
        let Some(incoming) = incoming.and_then(FieldValue::as_set) else {
            return false;
        };
        if self.is_field_empty(index) {
            self.put_value(index, FieldValue::Set(incoming.clone()));
            return !incoming.is_empty();
        }
        match self.value_at_mut(index) {
            Some(FieldValue::Set(set)) => {
                let before = set.len();
                set.extend(incoming.iter().cloned());
                set.len() != before
            }
            _ => false,
        }
    }

    /// Names with whitespace removed and lowercased, for identity matching.
    pub fn normalized_names(&self) -> BTreeSet<String> {
        self.names()
            .iter()
            .map(|n| n.split_whitespace().collect::<String>().to_lowercase())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::chemistry;
    use crate::record::Record;

    fn compound() -> Record {
        Record::of(&chemistry::registry(), "Compound").unwrap()
    }

    #[test]
    fn test_identity_only() {
        let named = compound().with("names", ["benzene"]).unwrap();
        assert!(named.is_identity_only());

        let roles_only = compound().with("roles", ["product"]).unwrap();
        assert!(!roles_only.is_identity_only());

        let mp = Record::of(&chemistry::registry(), "MeltingPoint").unwrap();
        assert!(!mp.is_identity_only());
    }

    #[test]
    fn test_unidentified() {
        let registry = chemistry::registry();
        let mut mp = Record::of(&registry, "MeltingPoint")
            .unwrap()
            .with("raw_value", "90")
            .unwrap();
        assert!(mp.is_unidentified());

        mp.assign_identity(compound().with("labels", ["1"]).unwrap()).unwrap();
        assert!(!mp.is_unidentified());

        let apparatus = Record::of(&registry, "Apparatus").unwrap();
        assert!(!apparatus.is_unidentified());
    }

    #[test]
    fn test_assign_identity_rejects_other_types() {
        let registry = chemistry::registry();
        let mut mp = Record::of(&registry, "MeltingPoint").unwrap();
        let apparatus = Record::of(&registry, "Apparatus")
            .unwrap()
            .with("name", "Buchi")
            .unwrap();
        assert!(!mp.assign_identity(apparatus).unwrap());
        assert!(mp.identity_record().is_none());
    }

    #[test]
    fn test_union_identity_reports_changes() {
        let mut a = compound().with("names", ["benzene"]).unwrap();
        let b = compound()
            .with("names", ["benzene"])
            .unwrap()
            .with("labels", ["1"])
            .unwrap();
        assert!(a.union_identity(&b));
        assert!(!a.union_identity(&b));
        assert_eq!(a.labels().into_iter().collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn test_normalized_names() {
        let c = compound().with("names", ["Benzoic  Acid"]).unwrap();
        assert_eq!(
            c.normalized_names().into_iter().collect::<Vec<_>>(),
            vec!["benzoicacid"]
        );
    }
}
