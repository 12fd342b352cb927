pub mod dao;
pub mod error;
pub mod identity;
pub mod loader;
pub mod outcome;
pub mod registry;
pub mod relations;
pub mod service;

#[cfg(test)]
mod testing;

pub use dao::DataAccess;
pub use error::DataError;
pub use identity::{IdentitySource, SequenceIdentity, UuidIdentity};
pub use loader::RegistryLoader;
pub use outcome::{Outcome, Payload, Status};
pub use registry::{EntityEntry, Registry, RegistryBuilder};
pub use relations::{CascadeRule, ChildLink, MultiselectLink, ParentLink, Relations};
pub use service::EntityService;
