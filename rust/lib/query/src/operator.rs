//! Comparison operators and their binding rules.
//!
//! Each `Criterion` variant owns both its SQL fragment shape and the values
//! it binds. `compile` produces the two together in one traversal, so the
//! placeholder sequence and the bind list cannot drift apart; operators
//! that take no placeholder (IS NULL, IS NOT NULL, sub-queries) bind nothing.

use openerp_sql::{DatePart, Dialect, Value};

use crate::error::QueryError;
use crate::schema::{FieldDef, SearchMode};
use crate::value::FieldValue;

/// A filter condition on one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Operator chosen from the schema and the value (see `resolve`).
    Match(FieldValue),
    Eq(FieldValue),
    EqIgnoreCase(String),
    StartsWith(String),
    StartsWithIgnoreCase(String),
    Contains(String),
    ContainsIgnoreCase(String),
    Ne(FieldValue),
    Lt(FieldValue),
    Le(FieldValue),
    Gt(FieldValue),
    Ge(FieldValue),
    In(Vec<FieldValue>),
    NotIn(Vec<FieldValue>),
    /// Membership in the result of caller-supplied sub-query text.
    InQuery(String),
    NotInQuery(String),
    IsNull,
    IsNotNull,
    DatePart(DatePart, i64),
    /// `func(column) = ?`
    Function { name: String, value: FieldValue },
    /// `func(column) LIKE ?`, substring match.
    FunctionLike { name: String, pattern: String },
    /// Alternatives on the same attribute, parenthesised.
    Or(Vec<Criterion>),
    FullText(String),
}

/// A compiled fragment and the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Clause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Clause {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }

    fn bare(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }
}

impl Criterion {
    /// Default operator for a plain value: the field's declared search
    /// mode, else case-insensitive substring for text, else equality.
    /// Lists become IN and Null becomes IS NULL regardless of the mode.
    pub fn resolve(value: &FieldValue, field: &FieldDef) -> Criterion {
        match value {
            FieldValue::Null => return Criterion::IsNull,
            FieldValue::List(items) => return Criterion::In(items.clone()),
            _ => {}
        }

        let text = || value.search_text().unwrap_or_default();
        match field.search {
            Some(SearchMode::Equal) => Criterion::Eq(value.clone()),
            Some(SearchMode::EqualIgnoreCase) => Criterion::EqIgnoreCase(text()),
            Some(SearchMode::StartsWith) => Criterion::StartsWith(text()),
            Some(SearchMode::StartsWithIgnoreCase) => Criterion::StartsWithIgnoreCase(text()),
            Some(SearchMode::Contains) => Criterion::Contains(text()),
            Some(SearchMode::ContainsIgnoreCase) => Criterion::ContainsIgnoreCase(text()),
            Some(SearchMode::FullText) => Criterion::FullText(text()),
            None => match value {
                FieldValue::Text(s) => Criterion::ContainsIgnoreCase(s.clone()),
                other => Criterion::Eq(other.clone()),
            },
        }
    }

    /// Number of placeholders this criterion emits.
    pub fn placeholders(&self) -> usize {
        match self {
            Criterion::Match(v) => match v {
                FieldValue::Null => 0,
                FieldValue::List(items) => items.len(),
                _ => 1,
            },
            Criterion::Eq(v) | Criterion::Ne(v) if v.is_null() => 0,
            Criterion::In(items) | Criterion::NotIn(items) => items.len(),
            Criterion::InQuery(_) | Criterion::NotInQuery(_) => 0,
            Criterion::IsNull | Criterion::IsNotNull => 0,
            Criterion::Or(alternatives) => alternatives.iter().map(Criterion::placeholders).sum(),
            _ => 1,
        }
    }

    /// Render this criterion against `column` (already qualified or
    /// wrapped by the caller) and collect its bind values.
    pub fn compile(
        &self,
        column: &str,
        field: &FieldDef,
        dialect: &dyn Dialect,
    ) -> Result<Clause, QueryError> {
        let bind = |v: &FieldValue| -> Result<Value, QueryError> {
            v.to_sql()
                .map_err(|_| QueryError::value(&field.name, "nested values cannot be used as filters"))
        };

        Ok(match self {
            Criterion::Match(value) => return Criterion::resolve(value, field).compile(column, field, dialect),
            Criterion::Eq(v) if v.is_null() => Clause::bare(format!("{column} IS NULL")),
            Criterion::Eq(v) => Clause::new(format!("{column} = ?"), vec![bind(v)?]),
            Criterion::EqIgnoreCase(s) => Clause::new(
                format!("UPPER({column}) = UPPER(?)"),
                vec![Value::Text(s.clone())],
            ),
            Criterion::StartsWith(s) => {
                Clause::new(format!("{column} LIKE ?"), vec![Value::Text(like_pattern(s, false))])
            }
            Criterion::StartsWithIgnoreCase(s) => Clause::new(
                format!("UPPER({column}) LIKE UPPER(?)"),
                vec![Value::Text(like_pattern(s, false))],
            ),
            Criterion::Contains(s) => {
                Clause::new(format!("{column} LIKE ?"), vec![Value::Text(like_pattern(s, true))])
            }
            Criterion::ContainsIgnoreCase(s) => Clause::new(
                format!("UPPER({column}) LIKE UPPER(?)"),
                vec![Value::Text(like_pattern(s, true))],
            ),
            Criterion::Ne(v) if v.is_null() => Clause::bare(format!("{column} IS NOT NULL")),
            Criterion::Ne(v) => Clause::new(format!("{column} <> ?"), vec![bind(v)?]),
            Criterion::Lt(v) => Clause::new(format!("{column} < ?"), vec![bind(v)?]),
            Criterion::Le(v) => Clause::new(format!("{column} <= ?"), vec![bind(v)?]),
            Criterion::Gt(v) => Clause::new(format!("{column} > ?"), vec![bind(v)?]),
            Criterion::Ge(v) => Clause::new(format!("{column} >= ?"), vec![bind(v)?]),
            Criterion::In(items) if items.is_empty() => Clause::bare("1 = 0".to_string()),
            Criterion::NotIn(items) if items.is_empty() => Clause::bare("1 = 1".to_string()),
            Criterion::In(items) | Criterion::NotIn(items) => {
                let keyword = if matches!(self, Criterion::In(_)) { "IN" } else { "NOT IN" };
                let params = items.iter().map(bind).collect::<Result<Vec<_>, _>>()?;
                let marks = vec!["?"; params.len()].join(", ");
                Clause::new(format!("{column} {keyword} ({marks})"), params)
            }
            Criterion::InQuery(sub) => Clause::bare(format!("{column} IN ({sub})")),
            Criterion::NotInQuery(sub) => Clause::bare(format!("{column} NOT IN ({sub})")),
            Criterion::IsNull => Clause::bare(format!("{column} IS NULL")),
            Criterion::IsNotNull => Clause::bare(format!("{column} IS NOT NULL")),
            Criterion::DatePart(part, n) => Clause::new(
                format!("{} = ?", dialect.date_part(*part, column)),
                vec![Value::Integer(*n)],
            ),
            Criterion::Function { name, value } => {
                check_function(name, field)?;
                Clause::new(format!("{name}({column}) = ?"), vec![bind(value)?])
            }
            Criterion::FunctionLike { name, pattern } => {
                check_function(name, field)?;
                Clause::new(
                    format!("{name}({column}) LIKE ?"),
                    vec![Value::Text(like_pattern(pattern, true))],
                )
            }
            Criterion::Or(alternatives) if alternatives.is_empty() => Clause::bare("1 = 0".to_string()),
            Criterion::Or(alternatives) => {
                let mut parts = Vec::with_capacity(alternatives.len());
                let mut params = Vec::new();
                for alt in alternatives {
                    let clause = alt.compile(column, field, dialect)?;
                    parts.push(clause.sql);
                    params.extend(clause.params);
                }
                Clause::new(format!("({})", parts.join(" OR ")), params)
            }
            Criterion::FullText(s) => Clause::new(dialect.full_text(column), vec![Value::Text(s.clone())]),
        })
    }
}

/// Add `%` wildcards unless the caller already placed one.
fn like_pattern(value: &str, leading: bool) -> String {
    if value.contains('%') {
        value.to_string()
    } else if leading {
        format!("%{value}%")
    } else {
        format!("{value}%")
    }
}

/// Function names are spliced into the statement, so only plain
/// (optionally schema-qualified) identifiers are accepted.
fn check_function(name: &str, field: &FieldDef) -> Result<(), QueryError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(QueryError::value(&field.name, format!("invalid function name '{name}'")))
    }
}
