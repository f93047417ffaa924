// doc constants
pub const DOC_ID: &str = "_id";
pub const FIELD_SEPARATOR: &str = ".";

// large object constants
pub const LOB_METADATA: &str = "metadata";
pub const LOB_METADATA_ID: &str = "metadata.id";
pub const LOB_FILE_ID: &str = "_id";
pub const LOB_ENTITY_ID: &str = "id";

// event constants
pub const TESSERA_EVENT: &str = "tessera_event";

// index constants
pub const ASCENDING: i32 = 1;
pub const DESCENDING: i32 = -1;

// configuration property keys
pub const PROP_BATCH_SIZE: &str = "tessera.batch.size";
pub const PROP_FLUSH_MODE: &str = "tessera.flush.mode";
pub const PROP_PERSISTENCE_CONTEXT: &str = "tessera.persistence.context";
pub const PROP_SHOW_QUERY: &str = "tessera.show.query";

pub const TESSERA_VERSION: &str = env!("CARGO_PKG_VERSION");
