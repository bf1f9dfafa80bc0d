// store constants
pub const DEFAULT_FILE_EXTENSION: &str = ".json";
pub const DEFAULT_METADATA_FILE: &str = ".sticky_metadata.json";
pub const TEMP_FILE_PREFIX: &str = ".sticky-tmp-";
pub const STORE_VERSION: &str = "1.0.0";

// migration constants
pub const INITIAL_SCHEMA_VERSION: u32 = 0;
pub const MIGRATION_FILE_EXTENSION: &str = "json";
