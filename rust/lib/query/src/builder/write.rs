use std::collections::BTreeSet;

use openerp_sql::Value;
use tracing::debug;

use super::{Audit, QueryBuilder, Statement, push_where};
use crate::error::QueryError;
use crate::params::QueryParams;
use crate::record::{FieldMap, Record};
use crate::schema::{FieldDef, FieldType, TokenKind};
use crate::value::FieldValue;

/// Which attributes of a record an INSERT writes.
#[derive(Debug, Clone, Default)]
pub struct InsertColumns {
    /// Never written.
    pub exclude: BTreeSet<String>,
    /// When set, only these are written (identity and token always are).
    pub only: Option<BTreeSet<String>>,
}

impl InsertColumns {
    fn admits(&self, name: &str) -> bool {
        !self.exclude.contains(name) && self.only.as_ref().is_none_or(|only| only.contains(name))
    }
}

impl QueryBuilder {
    /// INSERT of the record's stored attributes. The concurrency token is
    /// always initialised and "modified by" stamped from `audit`.
    pub fn insert(
        &self,
        record: &Record,
        columns: &InsertColumns,
        audit: &Audit,
    ) -> Result<Statement, QueryError> {
        self.check_kind(record)?;
        let mut names = Vec::new();
        let mut values = Vec::new();
        let mut binds = Vec::new();

        for field in self.schema.stored_fields() {
            if self.is_token(field) || self.is_modified_by(field) {
                continue;
            }
            let is_identity = field.name == self.schema.identity();
            if !is_identity && !columns.admits(&field.name) {
                continue;
            }
            let Some(value) = record.get(&field.name) else {
                continue;
            };
            names.push(field.column_name().to_string());
            values.push(self.placeholder(field));
            binds.push(bind(field, value)?);
        }
        self.stamp(&mut names, &mut values, &mut binds, audit);

        if names.is_empty() {
            return Err(QueryError::Schema(format!("{}: nothing to insert", self.schema.kind())));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.schema.table(),
            names.join(", "),
            values.join(", ")
        );
        debug!("QueryBuilder: insert {} ({} params)", sql, binds.len());
        Ok(Statement { sql, params: binds })
    }

    /// UPDATE of `changes` on the row with identity `id`. A given token
    /// must match the stored one, otherwise no row is affected; `None`
    /// skips the token check.
    pub fn update(
        &self,
        changes: &FieldMap,
        id: &FieldValue,
        token: Option<&FieldValue>,
        security: Option<&str>,
        audit: &Audit,
    ) -> Result<Statement, QueryError> {
        let (assignments, mut binds) = self.assignments(changes, audit)?;
        let mut sql = format!("UPDATE {} SET {assignments}", self.schema.table());
        let conditions = self.row_conditions(id, token, security, &mut binds)?;
        push_where(&mut sql, &conditions);
        debug!("QueryBuilder: update {} ({} params)", sql, binds.len());
        Ok(Statement { sql, params: binds })
    }

    /// Bulk UPDATE of every row matching `filter`.
    pub fn update_where(
        &self,
        changes: &FieldMap,
        filter: &mut Record,
        params: &QueryParams,
        audit: &Audit,
    ) -> Result<Statement, QueryError> {
        self.check_kind(filter)?;
        if !params.tables.is_empty() {
            return Err(QueryError::Schema(format!(
                "{}: bulk update cannot join other tables",
                self.schema.kind()
            )));
        }
        let (assignments, mut binds) = self.assignments(changes, audit)?;
        let mut sql = format!("UPDATE {} SET {assignments}", self.schema.table());
        let clause = self.where_clause(filter, params)?;
        push_where(&mut sql, &clause.sql);
        binds.extend(clause.params);
        Ok(Statement { sql, params: binds })
    }

    /// DELETE of the row with identity `id`, guarded like `update`.
    pub fn delete(
        &self,
        id: &FieldValue,
        token: Option<&FieldValue>,
        security: Option<&str>,
    ) -> Result<Statement, QueryError> {
        let mut binds = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.schema.table());
        let conditions = self.row_conditions(id, token, security, &mut binds)?;
        push_where(&mut sql, &conditions);
        Ok(Statement { sql, params: binds })
    }

    fn assignments(&self, changes: &FieldMap, audit: &Audit) -> Result<(String, Vec<Value>), QueryError> {
        for name in changes.keys() {
            self.schema.require(name)?;
        }
        let mut names = Vec::new();
        let mut values = Vec::new();
        let mut binds = Vec::new();
        for field in self.schema.stored_fields() {
            if self.schema.is_managed(&field.name) {
                continue;
            }
            if let Some(value) = changes.get(&field.name) {
                names.push(field.column_name().to_string());
                values.push(self.placeholder(field));
                binds.push(bind(field, value)?);
            }
        }
        self.stamp(&mut names, &mut values, &mut binds, audit);

        if names.is_empty() {
            return Err(QueryError::Schema(format!("{}: nothing to update", self.schema.kind())));
        }
        let sql = names
            .iter()
            .zip(&values)
            .map(|(n, v)| format!("{n} = {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok((sql, binds))
    }

    /// Identity, token and security conditions of a single-row write.
    fn row_conditions(
        &self,
        id: &FieldValue,
        token: Option<&FieldValue>,
        security: Option<&str>,
        binds: &mut Vec<Value>,
    ) -> Result<String, QueryError> {
        if id.is_null() {
            return Err(QueryError::value(self.schema.identity(), "identity is required"));
        }
        let identity = self.schema.identity_field();
        let mut conditions = vec![format!("{} = ?", identity.column_name())];
        binds.push(bind(identity, id)?);

        if let (Some(token), Some(field)) = (token, self.schema.token_field()) {
            if token.is_null() {
                conditions.push(format!("{} IS NULL", field.column_name()));
            } else {
                conditions.push(format!("{} = ?", field.column_name()));
                binds.push(bind(field, token)?);
            }
        }
        if let Some(security) = security.map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push(format!("({security})"));
        }
        Ok(conditions.join(" AND "))
    }

    /// Refresh the token and stamp "modified by".
    fn stamp(&self, names: &mut Vec<String>, values: &mut Vec<String>, binds: &mut Vec<Value>, audit: &Audit) {
        if let (Some(token), Some(field)) = (self.schema.token(), self.schema.token_field()) {
            names.push(field.column_name().to_string());
            match token.kind {
                TokenKind::Timestamp => values.push(self.dialect().current_timestamp().to_string()),
                TokenKind::Epoch => {
                    values.push("?".to_string());
                    binds.push(Value::Integer(audit.epoch_millis));
                }
            }
        }
        if let Some(field) = self.schema.modified_by().and_then(|m| self.schema.field(m)) {
            names.push(field.column_name().to_string());
            values.push("?".to_string());
            binds.push(audit.user.clone().map_or(Value::Null, Value::Text));
        }
    }

    fn placeholder(&self, field: &FieldDef) -> String {
        if field.ty == FieldType::Geometry {
            self.dialect().geometry_from_text("?")
        } else {
            "?".to_string()
        }
    }

    fn is_token(&self, field: &FieldDef) -> bool {
        self.schema.token().is_some_and(|t| t.attribute == field.name)
    }

    fn is_modified_by(&self, field: &FieldDef) -> bool {
        self.schema.modified_by() == Some(field.name.as_str())
    }
}

fn bind(field: &FieldDef, value: &FieldValue) -> Result<Value, QueryError> {
    value
        .to_sql()
        .map_err(|_| QueryError::value(&field.name, "nested values cannot be stored"))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    fn audit() -> Audit {
        Audit {
            user: Some("u1".into()),
            epoch_millis: 1_700_000_000_000,
        }
    }

    #[test]
    fn insert_stamps_token_and_modifier() {
        let record = person()
            .new_record()
            .with("id", 3)
            .with("name", "Bob")
            .with("changed", "2020-01-01 00:00:00")
            .with("orders", vec![1i64]);
        let stmt = oracle(person()).insert(&record, &InsertColumns::default(), &audit()).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO person (id, name, changed, changed_by) VALUES (?, ?, SYSTIMESTAMP, ?)"
        );
        assert_eq!(
            stmt.params,
            vec![Value::Integer(3), Value::Text("Bob".into()), Value::Text("u1".into())]
        );
    }

    #[test]
    fn insert_respects_exclude_and_only() {
        let record = person().new_record().with("id", 3).with("name", "Bob").with("age", 7);
        let columns = InsertColumns {
            exclude: BTreeSet::from(["age".to_string()]),
            only: None,
        };
        let stmt = oracle(person()).insert(&record, &columns, &audit()).unwrap();
        assert!(stmt.sql.starts_with("INSERT INTO person (id, name, changed"));

        let columns = InsertColumns {
            exclude: BTreeSet::new(),
            only: Some(BTreeSet::from(["age".to_string()])),
        };
        let stmt = oracle(person()).insert(&record, &columns, &audit()).unwrap();
        assert!(stmt.sql.starts_with("INSERT INTO person (id, age, changed"));
    }

    #[test]
    fn geometry_goes_through_text_constructor() {
        let record = site()
            .new_record()
            .with("id", 1)
            .with("area", "POLYGON((0 0, 1 0, 1 1, 0 0))")
            .with("label", "A");
        let stmt = oracle(site()).insert(&record, &InsertColumns::default(), &audit()).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO sites (site_id, area, label, version) VALUES (?, SDO_UTIL.FROM_WKTGEOMETRY(?), ?, ?)"
        );
        assert_eq!(stmt.params[3], Value::Integer(1_700_000_000_000));
    }

    #[test]
    fn update_guards_identity_token_and_security() {
        let changes = FieldMap::from([("age".to_string(), FieldValue::Int(41))]);
        let token = FieldValue::Text("2026-01-01 00:00:00.000".into());
        let stmt = oracle(person())
            .update(&changes, &FieldValue::Int(3), Some(&token), Some("age < 100"), &audit())
            .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE person SET age = ?, changed = SYSTIMESTAMP, changed_by = ? WHERE id = ? AND changed = ? AND (age < 100)"
        );
        assert_eq!(
            stmt.params,
            vec![
                Value::Integer(41),
                Value::Text("u1".into()),
                Value::Integer(3),
                Value::Text("2026-01-01 00:00:00.000".into()),
            ]
        );

        let stmt = oracle(person())
            .update(&changes, &FieldValue::Int(3), None, None, &audit())
            .unwrap();
        assert!(stmt.sql.ends_with("WHERE id = ?"));

        let unknown = FieldMap::from([("ghost".to_string(), FieldValue::Int(1))]);
        assert!(oracle(person()).update(&unknown, &FieldValue::Int(3), None, None, &audit()).is_err());
        assert!(oracle(person()).update(&changes, &FieldValue::Null, None, None, &audit()).is_err());
    }

    #[test]
    fn epoch_token_is_bound() {
        let changes = FieldMap::from([("label".to_string(), FieldValue::Text("B".into()))]);
        let stmt = sqlite(site())
            .update(&changes, &FieldValue::Int(1), Some(&FieldValue::Int(5)), None, &audit())
            .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE sites SET label = ?, version = ? WHERE site_id = ? AND version = ?"
        );
        assert_eq!(
            stmt.params,
            vec![
                Value::Text("B".into()),
                Value::Integer(1_700_000_000_000),
                Value::Integer(1),
                Value::Integer(5),
            ]
        );
    }

    #[test]
    fn bulk_update_binds_set_before_where() {
        let changes = FieldMap::from([("code".to_string(), FieldValue::Null)]);
        let mut filter = person().new_record().with("age", 30);
        let stmt = oracle(person())
            .update_where(&changes, &mut filter, &QueryParams::new(), &audit())
            .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE person SET code = ?, changed = SYSTIMESTAMP, changed_by = ? WHERE age = ?"
        );
        assert_eq!(
            stmt.params,
            vec![Value::Null, Value::Text("u1".into()), Value::Integer(30)]
        );
    }

    #[test]
    fn delete_by_identity_and_token() {
        let stmt = oracle(person())
            .delete(&FieldValue::Int(3), Some(&FieldValue::Null), None)
            .unwrap();
        assert_eq!(stmt.sql, "DELETE FROM person WHERE id = ? AND changed IS NULL");
        assert_eq!(stmt.params, vec![Value::Integer(3)]);
    }
}
