use crate::error::SQLError;

/// A dynamically-typed SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// A row returned from a SQL query: column name to value.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Get a column value by name. Falls back to a case-insensitive match
    /// because some backends fold unquoted identifiers to upper case.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.columns.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    /// Get a text column value by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer column value by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a real column value by name.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Real(f)) => Some(*f),
            Some(Value::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// First column of the row, regardless of its name.
    pub fn first(&self) -> Option<&Value> {
        self.columns.first().map(|(_, v)| v)
    }
}

/// SQLStore is the connection-like resource the engine runs on.
///
/// The caller owns it: the engine issues statements but never decides
/// transaction boundaries. `begin`/`commit`/`rollback` exist for the
/// caller, which wraps multi-step operations and decides the outcome.
pub trait SQLStore: Send + Sync {
    /// Execute a query and return rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError>;

    /// Execute a statement (INSERT/UPDATE/DELETE) and return affected row count.
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError>;

    /// Execute several parameterless statements (DDL scripts).
    fn exec_batch(&self, sql: &str) -> Result<(), SQLError>;

    fn begin(&self) -> Result<(), SQLError> {
        self.exec_batch("BEGIN")
    }

    fn commit(&self) -> Result<(), SQLError> {
        self.exec_batch("COMMIT")
    }

    fn rollback(&self) -> Result<(), SQLError> {
        self.exec_batch("ROLLBACK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_falls_back_to_case_insensitive() {
        let row = Row {
            columns: vec![
                ("ID".to_string(), Value::Integer(7)),
                ("name".to_string(), Value::Text("Bob".into())),
            ],
        };
        assert_eq!(row.get_i64("id"), Some(7));
        assert_eq!(row.get_str("name"), Some("Bob"));
        assert_eq!(row.get_f64("ID"), Some(7.0));
        assert!(row.get("missing").is_none());
        assert_eq!(row.first(), Some(&Value::Integer(7)));
    }
}
