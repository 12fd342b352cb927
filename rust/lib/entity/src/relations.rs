//! Relational metadata: how entity kinds refer to each other.
//!
//! Read-only configuration. The service consults it to attach parents,
//! maintain child collections, sync multiselects and cascade deletes.

use serde::{Deserialize, Serialize};

/// A record refers to one parent through `foreign_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    /// Attribute the loaded parent is attached under.
    pub name: String,
    /// Parent entity kind.
    pub entity: String,
    /// Attribute of this record holding the parent's key.
    pub foreign_key: String,
    /// Parent attribute matched by `foreign_key`; its identity when absent.
    #[serde(default)]
    pub parent_key: Option<String>,
}

/// A record owns a collection of child rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildLink {
    /// List attribute holding the child records.
    pub name: String,
    /// Child entity kind.
    pub entity: String,
    /// Child attribute referring to the master.
    pub foreign_key: String,
    /// Master attribute referred to; its identity when absent.
    #[serde(default)]
    pub master_key: Option<String>,
}

/// Many-to-many association kept in a link entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiselectLink {
    /// List attribute of the master holding the selected detail keys.
    pub name: String,
    /// Entity kind of the link rows.
    pub link_entity: String,
    /// Link attribute referring to the master identity.
    pub master_key: String,
    /// Link attribute holding the selected detail key.
    pub detail_key: String,
}

/// What happens to referencing rows when a record is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeRule {
    pub name: String,
    /// Referencing entity kind.
    pub entity: String,
    /// Attribute of the deleted record that is referenced.
    pub primary_key: String,
    /// Attribute of the referencing entity holding that value.
    pub foreign_key: String,
    /// Delete referencing rows; when false their foreign key is nulled.
    #[serde(default)]
    pub delete: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// All links of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Relations {
    #[serde(default)]
    pub parents: Vec<ParentLink>,
    #[serde(default)]
    pub children: Vec<ChildLink>,
    #[serde(default)]
    pub multiselects: Vec<MultiselectLink>,
    #[serde(default)]
    pub cascades: Vec<CascadeRule>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent(mut self, name: &str, entity: &str, foreign_key: &str) -> Self {
        self.parents.push(ParentLink {
            name: name.to_string(),
            entity: entity.to_string(),
            foreign_key: foreign_key.to_string(),
            parent_key: None,
        });
        self
    }

    pub fn child(mut self, name: &str, entity: &str, foreign_key: &str) -> Self {
        self.children.push(ChildLink {
            name: name.to_string(),
            entity: entity.to_string(),
            foreign_key: foreign_key.to_string(),
            master_key: None,
        });
        self
    }

    pub fn multiselect(mut self, name: &str, link_entity: &str, master_key: &str, detail_key: &str) -> Self {
        self.multiselects.push(MultiselectLink {
            name: name.to_string(),
            link_entity: link_entity.to_string(),
            master_key: master_key.to_string(),
            detail_key: detail_key.to_string(),
        });
        self
    }

    pub fn cascade(mut self, rule: CascadeRule) -> Self {
        self.cascades.push(rule);
        self
    }

    pub fn active_cascades(&self) -> impl Iterator<Item = &CascadeRule> {
        self.cascades.iter().filter(|r| r.active)
    }
}
