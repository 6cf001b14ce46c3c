//! Record type registration.
//!
//! Every record type is registered once through a [`RegistryBuilder`]. Types
//! are declared first (so fields can refer to types defined later, including
//! cycles), then defined from a [`SchemaBuilder`], then frozen into an
//! `Arc<Registry>`. The builder validates references and computes each type's
//! flatten closure once.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regex::Regex;

use crate::error::{RecordError, RecordResult, SchemaError};
use crate::field::{FieldKind, FieldSpec, RecordTypeId};

static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

/// Field indexes of an identity type's names, labels and roles sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityFields {
    pub names: usize,
    pub labels: usize,
    pub roles: usize,
}

/// Field list of a record type under construction.
///
/// ```
/// use layered_records::{FieldSpec, SchemaBuilder};
///
/// let base = SchemaBuilder::new()
///     .field("raw_value", FieldSpec::text().required())
///     .field("units", FieldSpec::text());
/// let derived = SchemaBuilder::new()
///     .embed(&base)
///     .field("units", FieldSpec::text().contextual());
///
/// assert_eq!(derived.field_names(), vec!["raw_value", "units"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    fields: Vec<(String, FieldSpec)>,
    identity: Option<[String; 3]>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A field with the same name is replaced in place.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = spec,
            None => self.fields.push((name, spec)),
        }
        self
    }

    /// Copy every field of `base`. Fields added afterwards override.
    pub fn embed(mut self, base: &SchemaBuilder) -> Self {
        for (name, spec) in &base.fields {
            self = self.field(name.clone(), spec.clone());
        }
        if self.identity.is_none() {
            self.identity = base.identity.clone();
        }
        self
    }

    /// Mark this type as an identity type with the given set fields.
    pub fn identity(
        mut self,
        names: impl Into<String>,
        labels: impl Into<String>,
        roles: impl Into<String>,
    ) -> Self {
        self.identity = Some([names.into(), labels.into(), roles.into()]);
        self
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Frozen description of one record type.
#[derive(Debug)]
pub struct Schema {
    id: RecordTypeId,
    name: String,
    fields: Vec<(String, FieldSpec)>,
    index: HashMap<String, usize>,
    identity: Option<IdentityFields>,
    identity_field: Option<usize>,
    flatten: Vec<RecordTypeId>,
}

impl Schema {
    pub fn id(&self) -> RecordTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index_of(name).map(|i| &self.fields[i].1)
    }

    pub fn field_name(&self, index: usize) -> &str {
        &self.fields[index].0
    }

    pub fn spec(&self, index: usize) -> &FieldSpec {
        &self.fields[index].1
    }

    /// Look a field up, failing with `NotFound` for unknown names.
    pub fn require(&self, name: &str) -> RecordResult<usize> {
        self.index_of(name).ok_or_else(|| RecordError::NotFound {
            record_type: self.name.clone(),
            path: name.to_string(),
        })
    }

    /// Names/labels/roles of an identity type.
    pub fn identity(&self) -> Option<IdentityFields> {
        self.identity
    }

    pub fn is_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// First nested field whose type is an identity type, e.g. `compound`.
    pub fn identity_field(&self) -> Option<usize> {
        self.identity_field
    }

    /// This type plus every type reachable through nested fields.
    pub fn flatten(&self) -> &[RecordTypeId] {
        &self.flatten
    }

    /// Whether a record of type `id` could appear anywhere inside this type.
    pub fn reaches(&self, id: RecordTypeId) -> bool {
        self.flatten.contains(&id)
    }

    pub fn has_binding_fields(&self) -> bool {
        self.fields.iter().any(|(_, s)| s.binding)
    }
}

/// An immutable set of record types, shared between all records built from it.
#[derive(Debug)]
pub struct Registry {
    uid: u64,
    schemas: Vec<Schema>,
    by_name: HashMap<String, RecordTypeId>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Panics when `id` was not handed out by this registry.
    pub fn schema(&self, id: RecordTypeId) -> &Schema {
        assert_eq!(id.registry, self.uid, "record type id from another registry");
        &self.schemas[id.index()]
    }

    pub fn get(&self, id: RecordTypeId) -> Option<&Schema> {
        if id.registry != self.uid {
            return None;
        }
        self.schemas.get(id.index())
    }

    /// Resolve a type name.
    pub fn id(&self, name: &str) -> RecordResult<RecordTypeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RecordError::NotFound {
                record_type: name.to_string(),
                path: String::new(),
            })
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Collects declarations and definitions, then validates them into a [`Registry`].
///
/// ```
/// use layered_records::{FieldSpec, Registry, ScalarKind, SchemaBuilder};
///
/// let mut builder = Registry::builder();
/// let compound = builder.declare("Compound");
/// let mp = builder.declare("MeltingPoint");
/// builder
///     .define(compound, SchemaBuilder::new()
///         .field("names", FieldSpec::set_of(ScalarKind::Text))
///         .field("labels", FieldSpec::set_of(ScalarKind::Text))
///         .field("roles", FieldSpec::set_of(ScalarKind::Text))
///         .identity("names", "labels", "roles"))
///     .unwrap();
/// builder
///     .define(mp, SchemaBuilder::new()
///         .field("value", FieldSpec::number())
///         .field("compound", FieldSpec::nested(compound).contextual()))
///     .unwrap();
/// let registry = builder.build().unwrap();
///
/// assert_eq!(registry.schema(mp).flatten(), &[mp, compound]);
/// ```
#[derive(Debug)]
pub struct RegistryBuilder {
    uid: u64,
    names: Vec<String>,
    definitions: Vec<Option<SchemaBuilder>>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            uid: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            names: Vec::new(),
            definitions: Vec::new(),
        }
    }

    /// Reserve an id for `name`. Declaring a name twice returns the same id.
    pub fn declare(&mut self, name: impl Into<String>) -> RecordTypeId {
        let name = name.into();
        if let Some(index) = self.names.iter().position(|n| *n == name) {
            return self.id_at(index);
        }
        self.names.push(name);
        self.definitions.push(None);
        self.id_at(self.names.len() - 1)
    }

    pub fn define(&mut self, id: RecordTypeId, schema: SchemaBuilder) -> Result<(), SchemaError> {
        if id.registry != self.uid {
            return Err(SchemaError::ForeignType {
                record_type: format!("#{}", id.index),
                field: String::new(),
            });
        }
        let slot = &mut self.definitions[id.index()];
        if slot.is_some() {
            return Err(SchemaError::Duplicate(self.names[id.index()].clone()));
        }
        *slot = Some(schema);
        Ok(())
    }

    /// Declare and define in one step.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        schema: SchemaBuilder,
    ) -> Result<RecordTypeId, SchemaError> {
        let id = self.declare(name);
        self.define(id, schema)?;
        Ok(id)
    }

    fn id_at(&self, index: usize) -> RecordTypeId {
        RecordTypeId {
            registry: self.uid,
            index: index as u32,
        }
    }

    pub fn build(self) -> Result<Arc<Registry>, SchemaError> {
        let uid = self.uid;
        let count = self.names.len();
        let mut schemas = Vec::with_capacity(count);
        for (index, (name, definition)) in self.names.iter().zip(self.definitions).enumerate() {
            let definition = definition.ok_or_else(|| SchemaError::Undefined(name.clone()))?;
            let fields = definition.fields;

            for (field, spec) in &fields {
                if let Some(target) = spec.kind.record_type() {
                    if target.registry != uid || target.index() >= count {
                        return Err(SchemaError::ForeignType {
                            record_type: name.clone(),
                            field: field.clone(),
                        });
                    }
                }
                if let Some(source) = &spec.pattern {
                    Regex::new(source).map_err(|source| SchemaError::Pattern {
                        record_type: name.clone(),
                        field: field.clone(),
                        source,
                    })?;
                }
            }

            let index_map: HashMap<String, usize> = fields
                .iter()
                .enumerate()
                .map(|(i, (n, _))| (n.clone(), i))
                .collect();

            let identity = match &definition.identity {
                Some(names) => {
                    let mut slots = [0usize; 3];
                    for (slot, field) in slots.iter_mut().zip(names.iter()) {
                        *slot = match index_map.get(field) {
                            Some(i) if matches!(fields[*i].1.kind, FieldKind::SetOfScalar(_)) => *i,
                            _ => {
                                return Err(SchemaError::IdentityField {
                                    record_type: name.clone(),
                                    field: field.clone(),
                                })
                            }
                        };
                    }
                    Some(IdentityFields {
                        names: slots[0],
                        labels: slots[1],
                        roles: slots[2],
                    })
                }
                None => None,
            };

            schemas.push(Schema {
                id: RecordTypeId {
                    registry: uid,
                    index: index as u32,
                },
                name: name.clone(),
                fields,
                index: index_map,
                identity,
                identity_field: None,
                flatten: Vec::new(),
            });
        }

        let is_identity: Vec<bool> = schemas.iter().map(Schema::is_identity).collect();
        for schema in schemas.iter_mut() {
            schema.identity_field = schema.fields.iter().position(|(_, spec)| {
                matches!(spec.kind, FieldKind::Nested(target) if is_identity[target.index()])
            });
        }

        let closures: Vec<Vec<RecordTypeId>> = (0..schemas.len())
            .map(|start| type_closure(&schemas, start))
            .collect();
        for (schema, closure) in schemas.iter_mut().zip(closures) {
            schema.flatten = closure;
        }

        let by_name = schemas.iter().map(|s| (s.name.clone(), s.id)).collect();
        Ok(Arc::new(Registry {
            uid,
            schemas,
            by_name,
        }))
    }
}

/// Breadth-first walk over nested kinds. Cycles terminate on the visited set.
fn type_closure(schemas: &[Schema], start: usize) -> Vec<RecordTypeId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        order.push(schemas[current].id);
        for (_, spec) in &schemas[current].fields {
            if let Some(target) = spec.kind.record_type() {
                queue.push_back(target.index());
            }
        }
    }
    order
}
