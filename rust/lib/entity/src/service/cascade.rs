use tracing::debug;

use openerp_query::{Criterion, FieldValue, Record};

use crate::error::DataError;
use crate::outcome::Outcome;
use crate::relations::CascadeRule;
use crate::service::EntityService;

impl EntityService {
    /// Delete `record` after applying its cascade rules.
    ///
    /// The stored row is read first (NotFound, or ChangedTimestamp when the
    /// given token is stale). The count is the rows touched by the cascade
    /// plus the root row itself.
    pub fn delete(&self, record: &Record) -> Result<Outcome, DataError> {
        let kind = record.kind().to_string();
        let schema = self.schema(&kind)?.clone();
        let Some(id) = record.id().cloned() else {
            return Ok(Outcome::not_found());
        };

        let stored = match self.dao.get(&schema, Some(&id), &self.unsecured())?.into_record() {
            Some(stored) => stored,
            None => return Ok(Outcome::not_found()),
        };
        if let (Some(given), Some(current)) = (record.token(), stored.token()) {
            if given != current {
                return Ok(Outcome::changed_timestamp());
            }
        }

        let cascade = self.cascade_delete(&stored)?;
        let Some(cascaded) = cascade.as_count() else {
            return Ok(cascade);
        };

        let token = stored.write_token();
        let outcome = self
            .dao
            .delete(&schema, &id, token.as_ref(), &self.secured(&kind))?;
        match outcome.as_count() {
            Some(0) | None => self.explain_miss(&schema, &id),
            Some(n) => {
                debug!("EntityService: deleted {} {:?} (+{} cascaded)", kind, id, cascaded);
                Ok(Outcome::count(cascaded + n))
            }
        }
    }

    /// Apply every active cascade rule of `record`'s kind, without deleting
    /// `record` itself.
    ///
    /// For each rule the referencing rows are fetched a batch at a time
    /// and either deleted (recursively, with their own cascades) or
    /// detached by nulling their foreign key. Handled rows no longer
    /// match, so the first batch is fetched again until none remain. The
    /// first step that touches nothing aborts with NothingDone.
    pub fn cascade_delete(&self, record: &Record) -> Result<Outcome, DataError> {
        let relations = self.registry.relations(record.kind())?;
        let mut total = 0;
        for rule in relations.active_cascades() {
            let Some(key) = record.get(&rule.primary_key).filter(|v| !v.is_null()) else {
                continue;
            };
            match self.drain(rule, key)? {
                Some(n) => total += n,
                None => {
                    debug!("EntityService: cascade {}.{} aborted", record.kind(), rule.name);
                    return Ok(Outcome::nothing_done());
                }
            }
        }
        Ok(Outcome::count(total))
    }

    /// Handle every row referencing `key` under `rule`; `None` on failure.
    fn drain(&self, rule: &CascadeRule, key: &FieldValue) -> Result<Option<u64>, DataError> {
        let schema = self.schema(&rule.entity)?;
        let mut total = 0;
        loop {
            let mut filter = schema.new_record();
            filter.criterion(&rule.foreign_key, Criterion::Eq(key.clone()));
            let params = self
                .unsecured()
                .window(1, self.cascade_batch as u64)
                .max_rows(0);
            let batch = self.dao.list(&filter, &params)?.into_list().unwrap_or_default();
            if batch.is_empty() {
                return Ok(Some(total));
            }
            debug!("EntityService: cascade {} over {} {} rows", rule.name, batch.len(), rule.entity);

            for child in &batch {
                let Some(id) = child.id() else {
                    return Ok(None);
                };
                let touched = if rule.delete {
                    let nested = self.cascade_delete(child)?;
                    let Some(nested) = nested.as_count() else {
                        return Ok(None);
                    };
                    let deleted = self.dao.delete(schema, id, None, &self.unsecured())?;
                    deleted.as_count().filter(|n| *n > 0).map(|n| n + nested)
                } else {
                    let detached = self.dao.update_field(
                        schema,
                        id,
                        None,
                        &rule.foreign_key,
                        FieldValue::Null,
                        &self.unsecured(),
                    )?;
                    detached.as_count().filter(|n| *n > 0)
                };
                match touched {
                    Some(n) => total += n,
                    None => return Ok(None),
                }
            }
        }
    }
}
