//! Authorization trait consumed by the entity layer.
//!
//! The engine does NOT depend on any specific session or permission
//! module. It only knows this trait: a row-visibility predicate that is
//! injected into every generated WHERE clause, and two attribute
//! deny-lists. The concrete implementation is injected at startup time.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::UserContext;

/// Pluggable authorizer, asked once per entity per operation.
pub trait Authorizer: Send + Sync + 'static {
    /// Opaque SQL predicate restricting which rows `user` may see.
    /// `None` (or an empty string) means unrestricted.
    fn security_predicate(&self, entity: &str, user: &UserContext) -> Option<String>;

    /// Attribute names `user` may not read on `entity`.
    fn no_read(&self, entity: &str, user: &UserContext) -> BTreeSet<String>;

    /// Attribute names `user` may not write on `entity`.
    fn no_write(&self, entity: &str, user: &UserContext) -> BTreeSet<String>;
}

/// An authorizer that allows everything. Used for testing and for
/// trusted internal callers.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn security_predicate(&self, _entity: &str, _user: &UserContext) -> Option<String> {
        None
    }

    fn no_read(&self, _entity: &str, _user: &UserContext) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn no_write(&self, _entity: &str, _user: &UserContext) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// An authorizer whose predicate hides every row. Used for testing.
pub struct DenyAll;

impl Authorizer for DenyAll {
    fn security_predicate(&self, _entity: &str, _user: &UserContext) -> Option<String> {
        Some("1 = 0".to_string())
    }

    fn no_read(&self, _entity: &str, _user: &UserContext) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn no_write(&self, _entity: &str, _user: &UserContext) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Fixed per-entity rules, independent of the user.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    predicates: BTreeMap<String, String>,
    no_read: BTreeMap<String, BTreeSet<String>>,
    no_write: BTreeMap<String, BTreeSet<String>>,
}

impl StaticPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict visible rows of `entity` with `predicate`.
    pub fn with_predicate(mut self, entity: &str, predicate: &str) -> Self {
        self.predicates.insert(entity.to_string(), predicate.to_string());
        self
    }

    /// Hide `attribute` of `entity` from readers.
    pub fn deny_read(mut self, entity: &str, attribute: &str) -> Self {
        self.no_read
            .entry(entity.to_string())
            .or_default()
            .insert(attribute.to_string());
        self
    }

    /// Forbid writes to `attribute` of `entity`.
    pub fn deny_write(mut self, entity: &str, attribute: &str) -> Self {
        self.no_write
            .entry(entity.to_string())
            .or_default()
            .insert(attribute.to_string());
        self
    }
}

impl Authorizer for StaticPolicy {
    fn security_predicate(&self, entity: &str, _user: &UserContext) -> Option<String> {
        self.predicates.get(entity).cloned()
    }

    fn no_read(&self, entity: &str, _user: &UserContext) -> BTreeSet<String> {
        self.no_read.get(entity).cloned().unwrap_or_default()
    }

    fn no_write(&self, entity: &str, _user: &UserContext) -> BTreeSet<String> {
        self.no_write.get(entity).cloned().unwrap_or_default()
    }
}
