//! CRUD primitives over one caller-owned connection.
//!
//! Every statement comes from `QueryBuilder`; this layer only executes,
//! decodes rows and wraps results in an `Outcome`. It knows nothing about
//! concurrency tokens beyond passing them into WHERE clauses: telling
//! "not found" from "stale token" is the service's job.

use std::sync::Arc;

use tracing::{debug, warn};

use openerp_core::DataConfig;
use openerp_query::{
    AGGREGATE_COLUMN, Aggregate, Audit, COUNT_COLUMN, EntitySchema, FieldMap, FieldValue,
    InsertColumns, QueryBuilder, QueryParams, Record, Statement,
};
use openerp_sql::{Dialect, Row, SQLStore, SqliteStore, Value, dialect_for};

use crate::error::DataError;
use crate::identity::{IdentitySource, SequenceIdentity};
use crate::outcome::Outcome;

#[derive(Clone)]
pub struct DataAccess {
    store: Arc<dyn SQLStore>,
    dialect: Arc<dyn Dialect>,
    identity: Arc<dyn IdentitySource>,
    max_rows: usize,
}

impl DataAccess {
    /// Identities come from the dialect's sequence source unless replaced
    /// with `with_identity`.
    pub fn new(store: Arc<dyn SQLStore>, dialect: Arc<dyn Dialect>, config: &DataConfig) -> Self {
        Self {
            store,
            identity: Arc::new(SequenceIdentity::new(dialect.clone())),
            dialect,
            max_rows: config.max_rows,
        }
    }

    /// Open the configured SQLite database.
    pub fn open(config: &DataConfig) -> Result<Self, DataError> {
        let dialect = dialect_for(&config.dialect)
            .ok_or_else(|| DataError::Config(format!("unknown dialect '{}'", config.dialect)))?;
        if dialect.name() != "sqlite" {
            return Err(DataError::Config(format!(
                "dialect '{}' needs a caller-supplied connection",
                dialect.name()
            )));
        }
        let store = SqliteStore::open(&config.resolve_sqlite_path())?;
        Ok(Self::new(Arc::new(store), dialect, config))
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentitySource>) -> Self {
        self.identity = identity;
        self
    }

    pub fn store(&self) -> &Arc<dyn SQLStore> {
        &self.store
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn builder(&self, schema: &Arc<EntitySchema>) -> QueryBuilder {
        QueryBuilder::new(schema.clone(), self.dialect.clone())
    }

    fn query(&self, stmt: &Statement) -> Result<Vec<Row>, DataError> {
        debug!("DataAccess: query {} ({} params)", stmt.sql, stmt.params.len());
        Ok(self.store.query(&stmt.sql, &stmt.params)?)
    }

    fn exec(&self, stmt: &Statement) -> Result<u64, DataError> {
        debug!("DataAccess: exec {} ({} params)", stmt.sql, stmt.params.len());
        Ok(self.store.exec(&stmt.sql, &stmt.params)?)
    }

    // ── Reads ──

    /// Row by identity through the security and join predicates of
    /// `params`. An absent id issues no statement.
    pub fn get(
        &self,
        schema: &Arc<EntitySchema>,
        id: Option<&FieldValue>,
        params: &QueryParams,
    ) -> Result<Outcome, DataError> {
        let Some(id) = id.filter(|v| !v.is_null()) else {
            return Ok(Outcome::nothing_todo());
        };
        let stmt = self.builder(schema).select_by_id(id, params)?;
        let rows = self.query(&stmt)?;
        match rows.first() {
            Some(row) => Ok(Outcome::record(Record::from_row(schema, row)?)),
            None => Ok(Outcome::nothing_todo()),
        }
    }

    /// Records matching `filter`, truncated to the row limit.
    pub fn list(&self, filter: &Record, params: &QueryParams) -> Result<Outcome, DataError> {
        let schema = filter.schema().clone();
        let mut filter = filter.clone();
        let stmt = self.builder(&schema).select(&mut filter, params)?;
        let mut rows = self.query(&stmt)?;

        let limit = params.max_rows.unwrap_or(self.max_rows);
        if limit > 0 && rows.len() > limit {
            warn!(
                "DataAccess: {} search returned {} rows, truncated to {}",
                schema.kind(),
                rows.len(),
                limit
            );
            rows.truncate(limit);
        }

        let records = rows
            .iter()
            .map(|row| Record::from_row(&schema, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Outcome::list(records))
    }

    pub fn count(&self, filter: &Record, params: &QueryParams) -> Result<Outcome, DataError> {
        let schema = filter.schema().clone();
        let mut filter = filter.clone();
        let stmt = self.builder(&schema).count(&mut filter, params)?;
        let rows = self.query(&stmt)?;
        let count = rows
            .first()
            .and_then(|r| r.get_i64(COUNT_COLUMN))
            .unwrap_or(0);
        Ok(Outcome::count(count.max(0) as u64))
    }

    /// Single value without `group_by`; one record per group with it
    /// (group columns as returned, the result under `value`).
    pub fn aggregate(
        &self,
        func: Aggregate,
        attribute: Option<&str>,
        filter: &Record,
        params: &QueryParams,
    ) -> Result<Outcome, DataError> {
        let schema = filter.schema().clone();
        let mut filter = filter.clone();
        let stmt = self.builder(&schema).aggregate(func, attribute, &mut filter, params)?;
        let rows = self.query(&stmt)?;

        if params.group_by.is_none() {
            let value = rows
                .first()
                .and_then(|r| r.get(AGGREGATE_COLUMN).or_else(|| r.first()))
                .cloned()
                .map_or(FieldValue::Null, untyped);
            return Ok(Outcome::scalar(value));
        }

        let groups = rows
            .into_iter()
            .map(|row| {
                let mut record = schema.new_record();
                for (column, value) in row.columns {
                    record.set(&column, untyped(value));
                }
                record
            })
            .collect();
        Ok(Outcome::list(groups))
    }

    // ── Writes ──

    /// Insert `record`, allocating an identity first when it has none,
    /// then read it back through the security path. A row the caller
    /// cannot see afterwards is reported as NoRights; the insert itself
    /// is not undone.
    pub fn create(
        &self,
        record: &Record,
        columns: &InsertColumns,
        params: &QueryParams,
    ) -> Result<Outcome, DataError> {
        let schema = record.schema().clone();
        let mut record = record.clone();
        if record.id().is_none() {
            let id = self.identity.next_id(self.store.as_ref(), &schema)?;
            record.set_id(id);
        }

        let stmt = self.builder(&schema).insert(&record, columns, &Audit::now(&params.user))?;
        self.exec(&stmt)?;

        let created = self.get(&schema, record.id(), params)?;
        if created.is_ok() {
            Ok(created)
        } else {
            warn!("DataAccess: {} {:?} created but not visible to caller", schema.kind(), record.id());
            Ok(Outcome::no_rights())
        }
    }

    /// UPDATE by identity and token. Reports the affected row count only;
    /// zero means the row is missing, stale or hidden.
    pub fn update(
        &self,
        schema: &Arc<EntitySchema>,
        changes: &FieldMap,
        id: &FieldValue,
        token: Option<&FieldValue>,
        params: &QueryParams,
    ) -> Result<Outcome, DataError> {
        if changes.is_empty() {
            return Ok(Outcome::nothing_todo());
        }
        let stmt = self.builder(schema).update(
            changes,
            id,
            token,
            params.security_predicate(),
            &Audit::now(&params.user),
        )?;
        Ok(Outcome::count(self.exec(&stmt)?))
    }

    pub fn update_field(
        &self,
        schema: &Arc<EntitySchema>,
        id: &FieldValue,
        token: Option<&FieldValue>,
        attribute: &str,
        value: FieldValue,
        params: &QueryParams,
    ) -> Result<Outcome, DataError> {
        let changes = FieldMap::from([(attribute.to_string(), value)]);
        self.update(schema, &changes, id, token, params)
    }

    /// Bulk UPDATE of every row matching `filter`.
    pub fn update_fields_request(
        &self,
        changes: &FieldMap,
        filter: &Record,
        params: &QueryParams,
    ) -> Result<Outcome, DataError> {
        if changes.is_empty() {
            return Ok(Outcome::nothing_todo());
        }
        let schema = filter.schema().clone();
        let mut filter = filter.clone();
        let stmt = self
            .builder(&schema)
            .update_where(changes, &mut filter, params, &Audit::now(&params.user))?;
        Ok(Outcome::count(self.exec(&stmt)?))
    }

    /// Apply the same changes to each id, guarded by the matching token.
    /// An empty token list skips the token check; any other length
    /// mismatch is rejected before anything is written.
    pub fn update_many(
        &self,
        schema: &Arc<EntitySchema>,
        changes: &FieldMap,
        ids: &[FieldValue],
        tokens: &[FieldValue],
        params: &QueryParams,
    ) -> Result<Outcome, DataError> {
        if !tokens.is_empty() && tokens.len() != ids.len() {
            return Ok(Outcome::batch_mismatch());
        }
        if changes.is_empty() || ids.is_empty() {
            return Ok(Outcome::nothing_todo());
        }
        let mut total = 0;
        for (i, id) in ids.iter().enumerate() {
            let outcome = self.update(schema, changes, id, tokens.get(i), params)?;
            total += outcome.as_count().unwrap_or(0);
        }
        Ok(Outcome::count(total))
    }

    /// DELETE by identity and token; reports the affected row count.
    pub fn delete(
        &self,
        schema: &Arc<EntitySchema>,
        id: &FieldValue,
        token: Option<&FieldValue>,
        params: &QueryParams,
    ) -> Result<Outcome, DataError> {
        let stmt = self.builder(schema).delete(id, token, params.security_predicate())?;
        Ok(Outcome::count(self.exec(&stmt)?))
    }
}

/// Decode a column that has no declared type.
fn untyped(value: Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Integer(i) => FieldValue::Int(i),
        Value::Real(f) => FieldValue::Double(f),
        Value::Text(s) => FieldValue::Text(s),
        Value::Blob(b) => FieldValue::Binary(b),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::outcome::Status;
    use crate::testing::{Fixture, T0};
    use openerp_query::Criterion;

    fn seed_people(fx: &Fixture) {
        fx.seed(&format!(
            "INSERT INTO person (id, full_name, age, changed) VALUES
                (1, 'Bob', 40, '{T0}'), (2, 'Alice', 30, '{T0}'), (3, 'Bobby', 20, '{T0}');"
        ));
    }

    #[test]
    fn get_without_id_issues_nothing() {
        let fx = Fixture::new();
        let outcome = fx.dao.get(fx.schema("person"), None, &QueryParams::new()).unwrap();
        assert_eq!(outcome.status, Status::NothingTodo);
        let outcome = fx
            .dao
            .get(fx.schema("person"), Some(&FieldValue::Null), &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.status, Status::NothingTodo);
        assert!(fx.store.is_empty());
    }

    #[test]
    fn get_decodes_aliased_columns() {
        let fx = Fixture::new();
        seed_people(&fx);
        let outcome = fx
            .dao
            .get(fx.schema("person"), Some(&FieldValue::Int(1)), &QueryParams::new())
            .unwrap();
        let record = outcome.into_record().unwrap();
        assert_eq!(record.get("name").and_then(FieldValue::as_str), Some("Bob"));
        assert!(record.token().is_some());

        let missing = fx
            .dao
            .get(fx.schema("person"), Some(&FieldValue::Int(99)), &QueryParams::new())
            .unwrap();
        assert_eq!(missing.status, Status::NothingTodo);
    }

    #[test]
    fn list_and_count_share_the_filter() {
        let fx = Fixture::new();
        seed_people(&fx);
        let filter = fx.record("person").with("name", "bob");
        let listed = fx.dao.list(&filter, &QueryParams::new()).unwrap();
        assert_eq!(listed.as_list().unwrap().len(), 2);
        let counted = fx.dao.count(&filter, &QueryParams::new()).unwrap();
        assert_eq!(counted.as_count(), Some(2));
        // The caller's filter is not consumed.
        assert!(filter.contains("name"));
    }

    #[test]
    fn raw_alternatives_stay_under_security() {
        let fx = Fixture::new();
        seed_people(&fx);
        let mut filter = fx.record("person");
        filter.raw_filter("age = ? OR age = ?", vec![Value::Integer(20), Value::Integer(40)]);
        let params = QueryParams::new().security("age > 30");
        let listed = fx.dao.list(&filter, &params).unwrap().into_list().unwrap();
        let ages: Vec<_> = listed.iter().filter_map(|r| r.get("age").cloned()).collect();
        assert_eq!(ages, vec![FieldValue::Int(40)]);
    }

    #[test]
    fn list_truncates_to_max_rows() {
        let config = DataConfig {
            max_rows: 2,
            ..DataConfig::default()
        };
        let fx = Fixture::with_config(&config);
        seed_people(&fx);
        let all = fx.dao.list(&fx.record("person"), &QueryParams::new()).unwrap();
        assert_eq!(all.as_list().unwrap().len(), 2);
        let overridden = fx
            .dao
            .list(&fx.record("person"), &QueryParams::new().max_rows(0))
            .unwrap();
        assert_eq!(overridden.as_list().unwrap().len(), 3);
    }

    struct CountingIdentity {
        calls: AtomicUsize,
    }

    impl IdentitySource for CountingIdentity {
        fn next_id(&self, _store: &dyn SQLStore, _schema: &EntitySchema) -> Result<FieldValue, DataError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FieldValue::Int(100 + n as i64))
        }
    }

    #[test]
    fn create_allocates_identity_only_when_absent() {
        let fx = Fixture::new();
        let counter = Arc::new(CountingIdentity {
            calls: AtomicUsize::new(0),
        });
        let dao = fx.dao.clone().with_identity(counter.clone());

        let explicit = fx.record("tag").with("id", 7).with("label", "red");
        let outcome = dao.create(&explicit, &InsertColumns::default(), &QueryParams::new()).unwrap();
        assert!(outcome.is_ok());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

        let implicit = fx.record("tag").with("label", "blue");
        let outcome = dao.create(&implicit, &InsertColumns::default(), &QueryParams::new()).unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.as_record().unwrap().id(), Some(&FieldValue::Int(100)));
        assert_eq!(fx.column("tag", "id"), vec![FieldValue::Int(7), FieldValue::Int(100)]);
    }

    #[test]
    fn create_uses_sequence_source_by_default() {
        let fx = Fixture::new();
        fx.seed("INSERT INTO tag (id, label) VALUES (5, 'x');");
        let outcome = fx
            .dao
            .create(&fx.record("tag").with("label", "y"), &InsertColumns::default(), &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.as_record().unwrap().id(), Some(&FieldValue::Int(6)));
    }

    #[test]
    fn create_invisible_row_reports_no_rights() {
        let fx = Fixture::new();
        let params = QueryParams::new().security("1 = 0");
        let outcome = fx
            .dao
            .create(&fx.record("tag").with("id", 1).with("label", "x"), &InsertColumns::default(), &params)
            .unwrap();
        assert_eq!(outcome.status, Status::NoRights);
        // The row was written anyway.
        assert_eq!(fx.column("tag", "label"), vec![FieldValue::Text("x".into())]);
    }

    #[test]
    fn create_stamps_token_and_modifier() {
        let fx = Fixture::new();
        let params = QueryParams::new().user(openerp_core::UserContext::new("u9", "en"));
        let outcome = fx
            .dao
            .create(&fx.record("person").with("id", 1).with("name", "Eve"), &InsertColumns::default(), &params)
            .unwrap();
        let record = outcome.into_record().unwrap();
        assert!(record.token().is_some());
        assert_eq!(record.get("changed_by").and_then(FieldValue::as_str), Some("u9"));
    }

    #[test]
    fn update_matches_token() {
        let fx = Fixture::new();
        seed_people(&fx);
        let schema = fx.schema("person");
        let changes = FieldMap::from([("age".to_string(), FieldValue::Int(41))]);

        let stale = FieldValue::Text("1999-01-01 00:00:00.000".into());
        let outcome = fx
            .dao
            .update(schema, &changes, &FieldValue::Int(1), Some(&stale), &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.as_count(), Some(0));

        let current = FieldValue::Text(T0.into());
        let outcome = fx
            .dao
            .update(schema, &changes, &FieldValue::Int(1), Some(&current), &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.as_count(), Some(1));
        assert_eq!(fx.column("person", "age")[0], FieldValue::Int(41));
        // The token moved on.
        assert_ne!(fx.column("person", "changed")[0], FieldValue::Text(T0.into()));
    }

    #[test]
    fn update_many_checks_batch_sizes() {
        let fx = Fixture::new();
        seed_people(&fx);
        let schema = fx.schema("person");
        let changes = FieldMap::from([("age".to_string(), FieldValue::Int(1))]);
        let ids = [FieldValue::Int(1), FieldValue::Int(2)];

        let outcome = fx
            .dao
            .update_many(schema, &changes, &ids, &[FieldValue::Text(T0.into())], &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.status, Status::BatchMismatch);
        assert!(fx.store.writes().is_empty());

        let tokens = [FieldValue::Text(T0.into()), FieldValue::Text(T0.into())];
        let outcome = fx
            .dao
            .update_many(schema, &changes, &ids, &tokens, &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.as_count(), Some(2));
    }

    #[test]
    fn bulk_update_and_single_field() {
        let fx = Fixture::new();
        seed_people(&fx);
        let schema = fx.schema("person");
        let mut filter = fx.record("person");
        filter.criterion("age", Criterion::Ge(FieldValue::Int(30)));
        let changes = FieldMap::from([("dept_id".to_string(), FieldValue::Int(9))]);
        let outcome = fx
            .dao
            .update_fields_request(&changes, &filter, &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.as_count(), Some(2));

        let outcome = fx
            .dao
            .update_field(schema, &FieldValue::Int(3), None, "dept_id", FieldValue::Int(4), &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.as_count(), Some(1));
        assert_eq!(
            fx.column("person", "dept_id"),
            vec![FieldValue::Int(9), FieldValue::Int(9), FieldValue::Int(4)]
        );
    }

    #[test]
    fn delete_respects_security() {
        let fx = Fixture::new();
        seed_people(&fx);
        let schema = fx.schema("person");
        let hidden = QueryParams::new().security("age > 100");
        let outcome = fx.dao.delete(schema, &FieldValue::Int(1), None, &hidden).unwrap();
        assert_eq!(outcome.as_count(), Some(0));
        let outcome = fx
            .dao
            .delete(schema, &FieldValue::Int(1), None, &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.as_count(), Some(1));
    }

    #[test]
    fn aggregates() {
        let fx = Fixture::new();
        seed_people(&fx);
        let outcome = fx
            .dao
            .aggregate(Aggregate::Sum, Some("age"), &fx.record("person"), &QueryParams::new())
            .unwrap();
        assert_eq!(outcome.as_scalar(), Some(&FieldValue::Int(90)));

        fx.seed("UPDATE person SET dept_id = 1 WHERE id < 3;");
        let params = QueryParams::new().group_by("dept_id");
        let outcome = fx
            .dao
            .aggregate(Aggregate::Count, None, &fx.record("person"), &params)
            .unwrap();
        let groups = outcome.into_list().unwrap();
        assert_eq!(groups.len(), 2);
        let grouped: Vec<_> = groups.iter().map(|g| g.get("value").cloned()).collect();
        assert!(grouped.contains(&Some(FieldValue::Int(2))));
    }

    #[test]
    fn open_configured_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig::from_args(&[format!("--data-dir={}", dir.path().display())]);
        let dao = DataAccess::open(&config).unwrap();
        assert_eq!(dao.dialect().name(), "sqlite");
        dao.store().exec_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);").unwrap();
        assert!(dir.path().join("data.sqlite").exists());

        let oracle = DataConfig {
            dialect: "oracle".into(),
            ..config.clone()
        };
        assert!(matches!(DataAccess::open(&oracle), Err(DataError::Config(_))));
        let unknown = DataConfig {
            dialect: "db2".into(),
            ..config
        };
        assert!(matches!(DataAccess::open(&unknown), Err(DataError::Config(_))));
    }

    #[test]
    fn sql_errors_carry_statement() {
        let fx = Fixture::new();
        fx.seed("DROP TABLE tag;");
        let err = fx
            .dao
            .list(&fx.record("tag"), &QueryParams::new())
            .unwrap_err();
        assert!(err.to_string().contains("SELECT * FROM tag"));
    }
}
