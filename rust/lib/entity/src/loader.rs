use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use openerp_core::DataConfig;
use openerp_query::EntityDef;

use crate::error::DataError;
use crate::registry::{Registry, RegistryBuilder};
use crate::relations::Relations;

/// One entity definition file: the schema plus its relations.
#[derive(Debug, Deserialize)]
struct EntityFile {
    #[serde(flatten)]
    def: EntityDef,
    #[serde(default)]
    relations: Relations,
}

/// RegistryLoader reads entity definitions from a schema directory:
///
/// ```text
/// schema-dir/
/// ├── order.json        → kind "order"
/// ├── order_line.json   → kind "order_line"
/// └── notes.txt         (ignored)
/// ```
///
/// Each file holds one `EntityDef` with an optional `relations` object.
/// Links are validated when the builder is built, so files may refer to
/// each other in any order.
pub struct RegistryLoader;

impl RegistryLoader {
    /// Register every `*.json` definition in `dir` on `builder`. A missing
    /// directory loads nothing. Returns the builder and the number loaded.
    pub fn load(dir: &Path, mut builder: RegistryBuilder) -> Result<(RegistryBuilder, usize), DataError> {
        if !dir.is_dir() {
            debug!("RegistryLoader: schema dir {:?} does not exist, skipping", dir);
            return Ok((builder, 0));
        }

        let mut paths = Vec::new();
        let entries = fs::read_dir(dir).map_err(|e| DataError::Loader(format!("{}: {e}", dir.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Loader(e.to_string()))?;
            let path = entry.path();
            if path.is_file() && Self::is_json(&path) {
                paths.push(path);
            }
        }
        // Directory order is platform dependent.
        paths.sort();

        for path in &paths {
            let file = Self::read(path)?;
            debug!("RegistryLoader: {} from {:?}", file.def.kind, path);
            let schema = file.def.build()?;
            builder = builder.entity(schema, file.relations);
        }

        debug!("RegistryLoader: loaded {} entities from {:?}", paths.len(), dir);
        Ok((builder, paths.len()))
    }

    /// Build the registry from the configured schema directory.
    pub fn from_config(config: &DataConfig) -> Result<Arc<Registry>, DataError> {
        let (builder, _) = Self::load(&config.resolve_schema_dir(), Registry::builder())?;
        builder.build()
    }

    fn read(path: &Path) -> Result<EntityFile, DataError> {
        let data = fs::read_to_string(path).map_err(|e| DataError::Loader(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&data).map_err(|e| DataError::Loader(format!("{}: {e}", path.display())))
    }

    fn is_json(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
    }
}
