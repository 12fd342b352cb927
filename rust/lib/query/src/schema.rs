//! Entity schema: the configuration-time description of a record kind.
//!
//! Schemas are loaded once (from code or from JSON definitions) and are
//! immutable afterwards. Attribute-to-column lookups are precomputed in
//! `EntityDef::build` so statement assembly never scans field lists.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::record::Record;

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Long,
    Double,
    Date,
    Timestamp,
    Time,
    Boolean,
    Binary,
    LargeText,
    Geometry,
    Uuid,
    Json,
    /// Nested record (e.g. an attached parent). Never stored in a column.
    Record,
    /// Collection (child rows, multiselect ids). Never stored in a column.
    List,
}

impl FieldType {
    /// Virtual attributes live only on the record, not in the table.
    pub fn is_virtual(&self) -> bool {
        matches!(self, FieldType::Record | FieldType::List)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::String | FieldType::LargeText)
    }
}

/// Operator applied to an attribute when a plain value is used as a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Equal,
    EqualIgnoreCase,
    StartsWith,
    StartsWithIgnoreCase,
    Contains,
    ContainsIgnoreCase,
    FullText,
}

/// Representation of the optimistic concurrency token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Last-modified timestamp refreshed by the backend clock.
    Timestamp,
    /// Milliseconds since the Unix epoch, refreshed by the engine.
    Epoch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDef {
    pub attribute: String,
    pub kind: TokenKind,
}

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Storage column; defaults to `name`.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub search: Option<SearchMode>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl FieldDef {
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: name.to_string(),
            column: None,
            ty,
            search: None,
            nullable: true,
        }
    }

    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    pub fn search(mut self, mode: SearchMode) -> Self {
        self.search = Some(mode);
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Storage column name.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Serializable entity definition, as read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub kind: String,
    pub table: String,
    pub identity: String,
    #[serde(default)]
    pub token: Option<TokenDef>,
    #[serde(default)]
    pub modified_by: Option<String>,
    #[serde(default)]
    pub sequence: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Validate the definition and precompute lookup tables.
    pub fn build(self) -> Result<Arc<EntitySchema>, QueryError> {
        let mut by_name = HashMap::with_capacity(self.fields.len());
        let mut by_column = HashMap::with_capacity(self.fields.len());

        for (i, field) in self.fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(QueryError::Schema(format!(
                    "{}: duplicate attribute '{}'",
                    self.kind, field.name
                )));
            }
            if field.ty.is_virtual() {
                continue;
            }
            if by_column
                .insert(field.column_name().to_string(), i)
                .is_some()
            {
                return Err(QueryError::Schema(format!(
                    "{}: duplicate column '{}'",
                    self.kind,
                    field.column_name()
                )));
            }
        }

        let stored = |name: &str, role: &str| -> Result<(), QueryError> {
            match by_name.get(name).map(|i| &self.fields[*i]) {
                Some(f) if !f.ty.is_virtual() => Ok(()),
                Some(_) => Err(QueryError::Schema(format!(
                    "{}: {} attribute '{}' must be stored",
                    self.kind, role, name
                ))),
                None => Err(QueryError::Schema(format!(
                    "{}: {} attribute '{}' is not declared",
                    self.kind, role, name
                ))),
            }
        };

        stored(&self.identity, "identity")?;
        if let Some(token) = &self.token {
            stored(&token.attribute, "token")?;
        }
        if let Some(modified_by) = &self.modified_by {
            stored(modified_by, "modified-by")?;
        }

        let has_geometry = self.fields.iter().any(|f| f.ty == FieldType::Geometry);

        Ok(Arc::new(EntitySchema {
            def: self,
            by_name,
            by_column,
            has_geometry,
        }))
    }
}

/// Immutable, validated schema of one entity kind.
#[derive(Debug)]
pub struct EntitySchema {
    def: EntityDef,
    by_name: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
    has_geometry: bool,
}

impl EntitySchema {
    pub fn builder(kind: &str, table: &str) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            def: EntityDef {
                kind: kind.to_string(),
                table: table.to_string(),
                identity: "id".to_string(),
                token: None,
                modified_by: None,
                sequence: None,
                fields: Vec::new(),
            },
        }
    }

    pub fn kind(&self) -> &str {
        &self.def.kind
    }

    pub fn table(&self) -> &str {
        &self.def.table
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.def.fields
    }

    /// Fields that map to a column, in declaration order.
    pub fn stored_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.def.fields.iter().filter(|f| !f.ty.is_virtual())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.by_name.get(name).map(|i| &self.def.fields[*i])
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldDef> {
        self.by_column
            .get(column)
            .or_else(|| {
                // Backends that fold identifiers change the case of column labels.
                self.by_column
                    .iter()
                    .find(|(c, _)| c.eq_ignore_ascii_case(column))
                    .map(|(_, i)| i)
            })
            .map(|i| &self.def.fields[*i])
    }

    /// Stored field by attribute name, or an error naming the entity.
    pub fn require(&self, name: &str) -> Result<&FieldDef, QueryError> {
        match self.field(name) {
            Some(f) if !f.ty.is_virtual() => Ok(f),
            _ => Err(QueryError::UnknownAttribute {
                entity: self.def.kind.clone(),
                attribute: name.to_string(),
            }),
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn identity(&self) -> &str {
        &self.def.identity
    }

    pub fn identity_field(&self) -> &FieldDef {
        // Presence is checked in build().
        &self.def.fields[self.by_name[&self.def.identity]]
    }

    pub fn token(&self) -> Option<&TokenDef> {
        self.def.token.as_ref()
    }

    pub fn token_field(&self) -> Option<&FieldDef> {
        self.def.token.as_ref().and_then(|t| self.field(&t.attribute))
    }

    pub fn modified_by(&self) -> Option<&str> {
        self.def.modified_by.as_deref()
    }

    pub fn sequence(&self) -> Option<&str> {
        self.def.sequence.as_deref()
    }

    pub fn has_geometry(&self) -> bool {
        self.has_geometry
    }

    /// True for identity, token and modified-by: attributes the engine maintains.
    pub fn is_managed(&self, name: &str) -> bool {
        name == self.def.identity
            || self.def.token.as_ref().is_some_and(|t| t.attribute == name)
            || self.def.modified_by.as_deref() == Some(name)
    }

    pub fn def(&self) -> &EntityDef {
        &self.def
    }

    /// Factory for an empty record of this kind.
    pub fn new_record(self: &Arc<Self>) -> Record {
        Record::new(Arc::clone(self))
    }
}

/// Fluent construction of schemas in code.
pub struct EntitySchemaBuilder {
    def: EntityDef,
}

impl EntitySchemaBuilder {
    pub fn field(mut self, field: FieldDef) -> Self {
        self.def.fields.push(field);
        self
    }

    pub fn identity(mut self, name: &str) -> Self {
        self.def.identity = name.to_string();
        self
    }

    pub fn token(mut self, attribute: &str, kind: TokenKind) -> Self {
        self.def.token = Some(TokenDef {
            attribute: attribute.to_string(),
            kind,
        });
        self
    }

    pub fn modified_by(mut self, attribute: &str) -> Self {
        self.def.modified_by = Some(attribute.to_string());
        self
    }

    pub fn sequence(mut self, name: &str) -> Self {
        self.def.sequence = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<Arc<EntitySchema>, QueryError> {
        self.def.build()
    }
}
