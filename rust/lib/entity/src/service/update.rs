use std::sync::Arc;

use tracing::{debug, warn};

use openerp_query::{EntitySchema, FieldValue, Record};

use crate::error::DataError;
use crate::outcome::{Outcome, Payload, Status};
use crate::service::EntityService;

impl EntityService {
    /// Optimistic-concurrency update of one record.
    ///
    /// The stored row is read first: missing is NotFound, a differing
    /// token is ChangedTimestamp and nothing is written. Only attributes
    /// that differ from the stored row, are not omitted and may be
    /// written go into the UPDATE, guarded by the token as stored. The
    /// row is then re-read through the row predicate; if the caller can
    /// no longer see it the result is NoRights, although the UPDATE has
    /// already run, and child collections and multiselects are left
    /// alone. Otherwise they follow. With nothing to write anywhere the
    /// result is NothingTodo.
    pub fn update(&self, record: &Record) -> Result<Outcome, DataError> {
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
                debug!("EntityService: {} {:?} token {:?} is stale", kind, id, given);
                return Ok(Outcome::changed_timestamp());
            }
        }

        let mut changes = record.diff(&stored);
        let denied = self.authorizer.no_write(&kind, &self.user);
        changes.retain(|name, _| !denied.contains(name));

        let mut refreshed = None;
        if !changes.is_empty() {
            let token = stored.write_token();
            let outcome = self
                .dao
                .update(&schema, &changes, &id, token.as_ref(), &self.secured(&kind))?;
            if outcome.as_count() == Some(0) {
                return self.explain_miss(&schema, &id);
            }
            match self.visible(&schema, &id)? {
                Some(row) => refreshed = Some(row),
                None => return Ok(Outcome::no_rights()),
            }
        }

        let saved = self.save_children(&stored, record, false)?;
        if !saved.is_ok() {
            return Ok(saved);
        }
        let synced = self.sync_multiselects(&stored, record)?;
        if !synced.is_ok() {
            return Ok(synced);
        }
        let related = saved.as_count().unwrap_or(0) > 0 || synced.as_count().unwrap_or(0) > 0;

        let refreshed = match refreshed {
            Some(row) => row,
            None if !related => return Ok(Outcome::nothing_todo()),
            None => match self.visible(&schema, &id)? {
                Some(row) => row,
                None => return Ok(Outcome::no_rights()),
            },
        };
        Ok(Outcome::record(self.present(refreshed)?))
    }

    /// Secured re-read after a write; `None` means the caller can no longer
    /// see the row.
    fn visible(&self, schema: &Arc<EntitySchema>, id: &FieldValue) -> Result<Option<Record>, DataError> {
        match self.dao.get(schema, Some(id), &self.secured(schema.kind()))?.payload {
            Payload::Record(row) => Ok(Some(*row)),
            _ => {
                warn!("EntityService: {} {:?} updated but not visible to caller", schema.kind(), id);
                Ok(None)
            }
        }
    }

    /// Update each record in turn. The count is the number of records
    /// written; records with nothing to write add nothing. The first other
    /// failure is returned as is.
    pub fn update_many(&self, records: &[Record]) -> Result<Outcome, DataError> {
        let mut total = 0;
        for record in records {
            let outcome = self.update(record)?;
            match outcome.status {
                Status::Ok => total += 1,
                Status::NothingTodo => {}
                _ => return Ok(outcome),
            }
        }
        Ok(Outcome::count(total))
    }

    /// A guarded write hit no row although the unsecured pre-read found it:
    /// hidden from the caller, or changed in between.
    pub(crate) fn explain_miss(&self, schema: &Arc<EntitySchema>, id: &FieldValue) -> Result<Outcome, DataError> {
        let visible = self.dao.get(schema, Some(id), &self.secured(schema.kind()))?;
        if visible.is_ok() {
            Ok(Outcome::changed_timestamp())
        } else {
            Ok(Outcome::no_rights())
        }
    }
}
