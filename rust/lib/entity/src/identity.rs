use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use openerp_core::new_id;
use openerp_query::{EntitySchema, FieldType, FieldValue};
use openerp_sql::{Dialect, SQLStore};

use crate::error::DataError;

/// Supplies identity values for records created without one.
pub trait IdentitySource: Send + Sync {
    fn next_id(&self, store: &dyn SQLStore, schema: &EntitySchema) -> Result<FieldValue, DataError>;
}

/// Asks the backend for the next value of the entity's sequence (or
/// whatever the dialect uses in its place).
pub struct SequenceIdentity {
    dialect: Arc<dyn Dialect>,
}

impl SequenceIdentity {
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self { dialect }
    }
}

impl IdentitySource for SequenceIdentity {
    fn next_id(&self, store: &dyn SQLStore, schema: &EntitySchema) -> Result<FieldValue, DataError> {
        let identity = schema.identity_field();
        let sql = self
            .dialect
            .next_identity(schema.table(), identity.column_name(), schema.sequence());
        let rows = store.query(&sql, &[])?;
        let value = rows
            .first()
            .and_then(|r| r.get("next_id").or_else(|| r.first()))
            .cloned()
            .ok_or_else(|| DataError::Identity(format!("{}: no value from [{sql}]", schema.kind())))?;
        let id = FieldValue::from_sql(identity.ty, value)?;
        if id.is_null() {
            return Err(DataError::Identity(format!("{}: null identity from [{sql}]", schema.kind())));
        }
        debug!("SequenceIdentity: {} -> {:?}", schema.kind(), id);
        Ok(id)
    }
}

/// Random v4 UUIDs, for entities keyed by UUID or text.
pub struct UuidIdentity;

impl IdentitySource for UuidIdentity {
    fn next_id(&self, _store: &dyn SQLStore, schema: &EntitySchema) -> Result<FieldValue, DataError> {
        match schema.identity_field().ty {
            FieldType::Uuid => Ok(FieldValue::Uuid(Uuid::new_v4())),
            FieldType::String | FieldType::LargeText => Ok(FieldValue::Text(new_id())),
            other => Err(DataError::Identity(format!(
                "{}: cannot generate a UUID for a {other:?} identity",
                schema.kind()
            ))),
        }
    }
}
