pub mod cascade;
pub mod multiselect;
pub mod relations;
pub mod update;

use std::sync::Arc;

use tracing::debug;

use openerp_core::{Authorizer, DataConfig, UserContext};
use openerp_query::{EntitySchema, FieldValue, InsertColumns, QueryParams, Record};

use crate::dao::DataAccess;
use crate::error::DataError;
use crate::outcome::{Outcome, Payload};
use crate::registry::Registry;

/// Business operations over registered entity kinds.
///
/// Wraps `DataAccess` with authorization (row predicate, read and write
/// deny-lists), optimistic concurrency, child collections, multiselects,
/// cascades and parent loading. Every multi-step method stops at the first
/// failing step and reports it as an `Outcome`; statements already issued
/// stay issued and rolling back is the caller's decision.
pub struct EntityService {
    registry: Arc<Registry>,
    dao: DataAccess,
    authorizer: Arc<dyn Authorizer>,
    user: UserContext,
    relation_depth: usize,
    cascade_batch: usize,
}

impl EntityService {
    pub fn new(
        registry: Arc<Registry>,
        dao: DataAccess,
        authorizer: Arc<dyn Authorizer>,
        user: UserContext,
        config: &DataConfig,
    ) -> Self {
        Self {
            registry,
            dao,
            authorizer,
            user,
            relation_depth: config.relation_depth,
            cascade_batch: config.cascade_batch.max(1),
        }
    }

    /// How many parent levels reads attach (0 disables parent loading).
    pub fn with_relation_depth(mut self, depth: usize) -> Self {
        self.relation_depth = depth;
        self
    }

    /// Rows fetched per round while draining a cascade.
    pub fn with_cascade_batch(mut self, batch: usize) -> Self {
        self.cascade_batch = batch.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn dao(&self) -> &DataAccess {
        &self.dao
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    // ── Parameters ──

    /// Parameters carrying the caller and the row predicate for `kind`.
    fn secured(&self, kind: &str) -> QueryParams {
        self.secure(kind, QueryParams::new())
    }

    /// Add the caller and the row predicate for `kind` to `params`. A
    /// predicate already present is kept and AND-ed with the authorizer's.
    fn secure(&self, kind: &str, params: QueryParams) -> QueryParams {
        let mut params = params.user(self.user.clone());
        let predicate = self
            .authorizer
            .security_predicate(kind, &self.user)
            .filter(|p| !p.trim().is_empty());
        params.security = match (params.security_predicate(), predicate) {
            (Some(given), Some(p)) => Some(format!("({given}) AND ({p})")),
            (Some(given), None) => Some(given.to_string()),
            (None, p) => p,
        };
        params
    }

    /// Parameters without a row predicate, for internal reads and
    /// maintenance writes.
    fn unsecured(&self) -> QueryParams {
        QueryParams::new().user(self.user.clone())
    }

    fn schema(&self, kind: &str) -> Result<&Arc<EntitySchema>, DataError> {
        self.registry.schema(kind)
    }

    /// Drop attributes the caller may not read.
    fn readable(&self, record: &mut Record) {
        let hidden = self.authorizer.no_read(record.kind(), &self.user);
        if !hidden.is_empty() {
            record.strip(&hidden);
        }
    }

    /// Drop attributes the caller may not write.
    fn writable(&self, record: &mut Record) {
        let denied = self.authorizer.no_write(record.kind(), &self.user);
        if !denied.is_empty() {
            debug!("EntityService: {} dropping unwritable {:?}", record.kind(), denied);
            record.strip(&denied);
        }
    }

    /// Readable view of a fetched record with its parents attached.
    fn present(&self, mut record: Record) -> Result<Record, DataError> {
        self.readable(&mut record);
        self.load_parents(&mut record, self.relation_depth)?;
        Ok(record)
    }

    // ── Reads ──

    /// Record of `kind` by identity, if visible to the caller.
    pub fn get(&self, kind: &str, id: Option<&FieldValue>) -> Result<Outcome, DataError> {
        let schema = self.schema(kind)?;
        let outcome = self.dao.get(schema, id, &self.secured(kind))?;
        match outcome.payload {
            Payload::Record(record) => Ok(Outcome::record(self.present(*record)?)),
            _ => Ok(outcome),
        }
    }

    /// Visible records matching `filter`. Sort, window and projection come
    /// from `params`.
    pub fn list(&self, filter: &Record, params: QueryParams) -> Result<Outcome, DataError> {
        let params = self.secure(filter.kind(), params);
        let outcome = self.dao.list(filter, &params)?;
        match outcome.payload {
            Payload::List(records) => {
                let records = records
                    .into_iter()
                    .map(|r| self.present(r))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Outcome::list(records))
            }
            _ => Ok(outcome),
        }
    }

    pub fn count(&self, filter: &Record, params: QueryParams) -> Result<Outcome, DataError> {
        let params = self.secure(filter.kind(), params);
        self.dao.count(filter, &params)
    }

    // ── Create ──

    /// Insert `record` (minus unwritable attributes), then its child
    /// collections and multiselects. Returns the stored record with its
    /// parents attached.
    pub fn create(&self, record: &Record) -> Result<Outcome, DataError> {
        let kind = record.kind().to_string();
        let mut incoming = record.clone();
        self.writable(&mut incoming);

        let outcome = self
            .dao
            .create(&incoming, &InsertColumns::default(), &self.secured(&kind))?;
        let created = match outcome.payload {
            Payload::Record(created) => created,
            _ => return Ok(outcome),
        };
        debug!("EntityService: created {} {:?}", kind, created.id());

        let saved = self.save_children(&created, &incoming, true)?;
        if !saved.is_ok() {
            return Ok(saved);
        }
        let synced = self.sync_multiselects(&created, &incoming)?;
        if !synced.is_ok() {
            return Ok(synced);
        }
        Ok(Outcome::record(self.present(*created)?))
    }
}
