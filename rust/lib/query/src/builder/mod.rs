//! Statement assembly.
//!
//! `QueryBuilder` turns a filter record plus `QueryParams` into statement
//! text with positional `?` placeholders and the matching bind list. It
//! never touches a connection; executing statements is the data layer's job.

mod filter;
mod projection;
mod sort;
mod write;

pub use write::InsertColumns;

use std::sync::Arc;

use openerp_core::{UserContext, now_epoch_millis};
use openerp_sql::{Dialect, Value};
use tracing::debug;

use crate::error::QueryError;
use crate::params::QueryParams;
use crate::record::Record;
use crate::schema::{EntitySchema, FieldDef};
use crate::value::FieldValue;

/// Statement text and its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Aggregate function for `QueryBuilder::aggregate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl Aggregate {
    pub fn function(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
            Aggregate::Avg => "AVG",
        }
    }
}

/// Who writes, and the epoch used for epoch-style concurrency tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    pub user: Option<String>,
    pub epoch_millis: i64,
}

impl Audit {
    pub fn now(user: &UserContext) -> Self {
        Self {
            user: user.user_id.clone(),
            epoch_millis: now_epoch_millis(),
        }
    }
}

/// Column label of a `count` statement.
pub const COUNT_COLUMN: &str = "row_count";
/// Column label of an `aggregate` result.
pub const AGGREGATE_COLUMN: &str = "value";

/// Builds statements for one entity kind on one backend.
#[derive(Clone)]
pub struct QueryBuilder {
    schema: Arc<EntitySchema>,
    dialect: Arc<dyn Dialect>,
}

impl QueryBuilder {
    pub fn new(schema: Arc<EntitySchema>, dialect: Arc<dyn Dialect>) -> Self {
        Self { schema, dialect }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Search statement: projection, filter, grouping, ordering, window.
    /// Consumes the record's raw fragment and any child-filter master values.
    pub fn select(&self, filter: &mut Record, params: &QueryParams) -> Result<Statement, QueryError> {
        self.check_kind(filter)?;
        let mut sql = format!("SELECT {} FROM {}", self.projection(params)?, self.from_clause(params));
        let clause = self.where_clause(filter, params)?;
        push_where(&mut sql, &clause.sql);
        if let Some(group_by) = &params.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        if let Some(order) = self.order_by(params)? {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        if let (Some(start), Some(end)) = (params.start, params.end) {
            sql = self.dialect.paginate(&sql, start, end);
        }
        debug!("QueryBuilder: select {} ({} params)", sql, clause.params.len());
        Ok(Statement {
            sql,
            params: clause.params,
        })
    }

    /// Row count of the search; sort and window are ignored.
    pub fn count(&self, filter: &mut Record, params: &QueryParams) -> Result<Statement, QueryError> {
        self.check_kind(filter)?;
        let mut sql = format!("SELECT COUNT(*) AS {COUNT_COLUMN} FROM {}", self.from_clause(params));
        let clause = self.where_clause(filter, params)?;
        push_where(&mut sql, &clause.sql);
        Ok(Statement {
            sql,
            params: clause.params,
        })
    }

    /// `func(attribute)` over the search, grouped by `params.group_by`
    /// when given (the group expression is selected first). Without an
    /// attribute the function applies to `*`.
    pub fn aggregate(
        &self,
        func: Aggregate,
        attribute: Option<&str>,
        filter: &mut Record,
        params: &QueryParams,
    ) -> Result<Statement, QueryError> {
        self.check_kind(filter)?;
        let target = match attribute {
            Some(name) => self.qualify(self.schema.require(name)?, params),
            None => "*".to_string(),
        };
        let select = match &params.group_by {
            Some(group_by) => format!("{group_by}, {}({target}) AS {AGGREGATE_COLUMN}", func.function()),
            None => format!("{}({target}) AS {AGGREGATE_COLUMN}", func.function()),
        };
        let mut sql = format!("SELECT {select} FROM {}", self.from_clause(params));
        let clause = self.where_clause(filter, params)?;
        push_where(&mut sql, &clause.sql);
        if let Some(group_by) = &params.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        Ok(Statement {
            sql,
            params: clause.params,
        })
    }

    /// Single row by identity, through the security and join predicates.
    pub fn select_by_id(&self, id: &FieldValue, params: &QueryParams) -> Result<Statement, QueryError> {
        let mut sql = format!("SELECT {} FROM {}", self.projection(params)?, self.from_clause(params));
        let mut conditions = vec![format!("{} = ?", self.qualify(self.schema.identity_field(), params))];
        let bound = id
            .to_sql()
            .map_err(|_| QueryError::value(self.schema.identity(), "identity must be a scalar"))?;
        if let Some(security) = params.security_predicate() {
            conditions.push(format!("({security})"));
        }
        conditions.extend(filter::join_predicates(params));
        push_where(&mut sql, &conditions.join(" AND "));
        Ok(Statement {
            sql,
            params: vec![bound],
        })
    }

    fn check_kind(&self, record: &Record) -> Result<(), QueryError> {
        if record.kind() == self.schema.kind() {
            Ok(())
        } else {
            Err(QueryError::Schema(format!(
                "{} record used with {} builder",
                record.kind(),
                self.schema.kind()
            )))
        }
    }

    fn from_clause(&self, params: &QueryParams) -> String {
        let mut from = self.schema.table().to_string();
        for table in &params.tables {
            from.push_str(", ");
            from.push_str(table);
        }
        from
    }

    /// Column reference, table-qualified once other tables are in scope.
    fn qualify(&self, field: &FieldDef, params: &QueryParams) -> String {
        if params.tables.is_empty() {
            field.column_name().to_string()
        } else {
            format!("{}.{}", self.schema.table(), field.column_name())
        }
    }
}

fn push_where(sql: &mut String, clause: &str) {
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
}

/// Placeholders outside quoted literals.
#[cfg(test)]
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut quoted = false;
    sql.chars()
        .filter(|c| {
            if *c == '\'' {
                quoted = !quoted;
            }
            *c == '?' && !quoted
        })
        .count()
}
