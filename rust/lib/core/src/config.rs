use std::path::PathBuf;

/// Configuration for the data access and orchestration layers.
///
/// Binaries parse these from command-line arguments, then pass the
/// value down to the storage layer and entity service constructors.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Directory containing static configuration (entity schemas, relations).
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/data.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Directory holding `*.json` entity definitions.
    /// Defaults to `{data_dir}/entities/` if not specified.
    pub schema_dir: Option<PathBuf>,

    /// Upper bound on rows returned by a single search. A call may
    /// override it through its query parameters.
    pub max_rows: usize,

    /// How many levels of parent records are attached on load.
    pub relation_depth: usize,

    /// Page size used when draining child rows during cascade delete.
    pub cascade_batch: usize,

    /// SQL dialect name: "sqlite", "postgres" or "oracle".
    pub dialect: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            schema_dir: None,
            max_rows: 1000,
            relation_depth: 1,
            cascade_batch: 100,
            dialect: "sqlite".to_string(),
        }
    }
}

impl DataConfig {
    /// Parse configuration from command-line arguments.
    ///
    /// Supported flags:
    /// - `--data-dir=PATH`
    /// - `--sqlite=PATH`
    /// - `--schema-dir=PATH`
    /// - `--max-rows=N`
    /// - `--relation-depth=N`
    /// - `--cascade-batch=N`
    /// - `--dialect=NAME`
    ///
    /// Numeric flags that fail to parse keep their default.
    pub fn from_args(args: &[String]) -> Self {
        let mut config = DataConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--data-dir=") {
                config.data_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--sqlite=") {
                config.sqlite_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--schema-dir=") {
                config.schema_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--max-rows=") {
                config.max_rows = val.parse().unwrap_or(config.max_rows);
            } else if let Some(val) = arg.strip_prefix("--relation-depth=") {
                config.relation_depth = val.parse().unwrap_or(config.relation_depth);
            } else if let Some(val) = arg.strip_prefix("--cascade-batch=") {
                config.cascade_batch = val.parse().unwrap_or(config.cascade_batch);
            } else if let Some(val) = arg.strip_prefix("--dialect=") {
                config.dialect = val.to_string();
            }
        }

        config
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/data.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.sqlite"))
    }

    /// Resolve the entity definition directory.
    pub fn resolve_schema_dir(&self) -> PathBuf {
        self.schema_dir
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("entities"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
