use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use openerp_sql::{Row, Value};

use crate::error::QueryError;
use crate::operator::Criterion;
use crate::schema::EntitySchema;
use crate::value::FieldValue;

/// Attribute name to value, as used by diffs and field updates.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Per-row tag on elements of a child collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowState {
    #[default]
    Unchanged,
    New,
    Modified,
    Deleted,
}

/// Alternatives OR-joined inside one parenthesised group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrGroup {
    members: Vec<(String, Criterion)>,
}

impl OrGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: &str, criterion: Criterion) -> Self {
        self.members.push((attribute.to_string(), criterion));
        self
    }

    pub fn members(&self) -> &[(String, Criterion)] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Caller-supplied filter text with its own bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFilter {
    pub sql: String,
    pub params: Vec<Value>,
}

/// "Has children" filter: keep only masters referenced from `table`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildFilter {
    pub table: String,
    pub foreign_key: String,
    /// Master attribute the foreign key points at; the identity when absent.
    pub master: Option<String>,
}

impl ChildFilter {
    pub fn new(table: &str, foreign_key: &str) -> Self {
        Self {
            table: table.to_string(),
            foreign_key: foreign_key.to_string(),
            master: None,
        }
    }

    pub fn master(mut self, attribute: &str) -> Self {
        self.master = Some(attribute.to_string());
        self
    }
}

/// A schema-typed record. Doubles as a search filter: plain values,
/// explicit criteria, OR-groups, a raw fragment and child filters all
/// feed the WHERE clause when the record is handed to the query builder.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<EntitySchema>,
    values: BTreeMap<String, FieldValue>,
    criteria: BTreeMap<String, Criterion>,
    or_groups: Vec<OrGroup>,
    raw: Option<RawFilter>,
    children: Vec<ChildFilter>,
    omit: BTreeSet<String>,
    state: RowState,
    /// Token column exactly as fetched, before decoding.
    stored_token: Option<Value>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.kind() == other.schema.kind()
            && self.values == other.values
            && self.criteria == other.criteria
            && self.or_groups == other.or_groups
            && self.raw == other.raw
            && self.children == other.children
            && self.omit == other.omit
            && self.state == other.state
    }
}

impl Record {
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
            criteria: BTreeMap::new(),
            or_groups: Vec::new(),
            raw: None,
            children: Vec::new(),
            omit: BTreeSet::new(),
            state: RowState::Unchanged,
            stored_token: None,
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn kind(&self) -> &str {
        self.schema.kind()
    }

    /// Set an attribute. Values of declared attributes are coerced to the
    /// declared type; undeclared names are kept as given.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> &mut Self {
        let value = value.into();
        let value = match self.schema.field(name) {
            Some(f) => f.ty.coerce(value),
            None => value,
        };
        if self.schema.token().is_some_and(|t| t.attribute == name) {
            self.stored_token = None;
        }
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.values.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// Reset to the state of a freshly constructed record.
    pub fn clear(&mut self) {
        self.values.clear();
        self.criteria.clear();
        self.or_groups.clear();
        self.raw = None;
        self.children.clear();
        self.omit.clear();
        self.state = RowState::Unchanged;
        self.stored_token = None;
    }

    /// Identity value, if set and not null.
    pub fn id(&self) -> Option<&FieldValue> {
        self.get(self.schema.identity()).filter(|v| !v.is_null())
    }

    pub fn set_id(&mut self, id: impl Into<FieldValue>) {
        let name = self.schema.identity().to_string();
        self.set(&name, id);
    }

    /// Concurrency token value, if the schema has one and it is set.
    pub fn token(&self) -> Option<&FieldValue> {
        self.schema
            .token()
            .and_then(|t| self.get(&t.attribute))
            .filter(|v| !v.is_null())
    }

    /// Token to guard a write with. A token read from storage is returned
    /// in its stored representation, so comparing it against the column
    /// does not depend on how precisely the decoded value round-trips.
    pub fn write_token(&self) -> Option<FieldValue> {
        let typed = self.token()?;
        Some(match &self.stored_token {
            Some(Value::Text(s)) => FieldValue::Text(s.clone()),
            Some(Value::Integer(i)) => FieldValue::Int(*i),
            Some(Value::Real(f)) => FieldValue::Double(*f),
            Some(Value::Blob(b)) => FieldValue::Binary(b.clone()),
            Some(Value::Null) | None => typed.clone(),
        })
    }

    pub fn set_token(&mut self, token: impl Into<FieldValue>) {
        if let Some(t) = self.schema.token() {
            let name = t.attribute.clone();
            self.set(&name, token);
        }
    }

    /// Explicit criterion for an attribute; overrides a plain value of the
    /// same name when the record is used as a filter.
    pub fn criterion(&mut self, name: &str, criterion: Criterion) -> &mut Self {
        self.criteria.insert(name.to_string(), criterion);
        self
    }

    pub fn criteria(&self) -> &BTreeMap<String, Criterion> {
        &self.criteria
    }

    pub fn or_group(&mut self, group: OrGroup) -> &mut Self {
        self.or_groups.push(group);
        self
    }

    pub fn or_groups(&self) -> &[OrGroup] {
        &self.or_groups
    }

    pub fn raw_filter(&mut self, sql: &str, params: Vec<Value>) -> &mut Self {
        self.raw = Some(RawFilter {
            sql: sql.to_string(),
            params,
        });
        self
    }

    pub fn take_raw(&mut self) -> Option<RawFilter> {
        self.raw.take()
    }

    pub fn has_children(&mut self, filter: ChildFilter) -> &mut Self {
        self.children.push(filter);
        self
    }

    pub fn child_filters(&self) -> &[ChildFilter] {
        &self.children
    }

    /// Exclude an attribute from diffs.
    pub fn omit(&mut self, name: &str) -> &mut Self {
        self.omit.insert(name.to_string());
        self
    }

    pub fn omitted(&self) -> &BTreeSet<String> {
        &self.omit
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn set_state(&mut self, state: RowState) {
        self.state = state;
    }

    pub fn with_state(mut self, state: RowState) -> Self {
        self.state = state;
        self
    }

    /// Remove every listed attribute (no-read / no-write filtering).
    pub fn strip(&mut self, names: &BTreeSet<String>) {
        self.values.retain(|k, _| !names.contains(k));
    }

    /// Build a record from a fetched row. Columns are matched by attribute
    /// name first (aliased projections), then by storage column; columns
    /// the schema does not know (pagination row numbers) are skipped.
    pub fn from_row(schema: &Arc<EntitySchema>, row: &Row) -> Result<Record, QueryError> {
        let mut record = Record::new(Arc::clone(schema));
        for (column, value) in &row.columns {
            let field = match schema.field(column).filter(|f| !f.ty.is_virtual()) {
                Some(f) => f,
                None => match schema.field_by_column(column) {
                    Some(f) => f,
                    None => continue,
                },
            };
            let decoded = FieldValue::from_sql(field.ty, value.clone()).map_err(|e| match e {
                QueryError::Value { reason, .. } => QueryError::value(&field.name, reason),
                other => other,
            })?;
            if schema.token().is_some_and(|t| t.attribute == field.name) {
                record.stored_token = Some(value.clone());
            }
            record.values.insert(field.name.clone(), decoded);
        }
        Ok(record)
    }

    /// Attributes whose value differs from `stored`. Only stored schema
    /// attributes present on this record are compared; engine-managed
    /// attributes and the omit-set never appear in the result.
    pub fn diff(&self, stored: &Record) -> FieldMap {
        let mut changes = FieldMap::new();
        for field in self.schema.stored_fields() {
            if self.schema.is_managed(&field.name) || self.omit.contains(&field.name) {
                continue;
            }
            let Some(value) = self.values.get(&field.name) else {
                continue;
            };
            let before = stored.get(&field.name).unwrap_or(&FieldValue::Null);
            if before != value {
                changes.insert(field.name.clone(), value.clone());
            }
        }
        changes
    }
}
