//! Names and bounds shared by the storage and temporal layers.

/// Upper bound of an open validity interval, as stored.
///
/// Matches the maximum of a system-versioned row end in MariaDB
/// (`2^32 - 1` seconds past the epoch, microsecond precision).
pub const SENTINEL_MAX_STR: &str = "2106-02-07T06:28:15.999999Z";

/// `SENTINEL_MAX_STR` as microseconds since the epoch.
pub const SENTINEL_MAX_MICROS: i64 = 4_294_967_295_999_999;

/// Audit ledger table.
pub const AUDIT_TABLE: &str = "__audit_log";

/// Table catalog (name → serialized schema).
pub const CATALOG_TABLE: &str = "__table_catalog";

/// Suffix appended to a table name for its closed versions.
pub const HISTORY_SUFFIX: &str = "__history";

/// Validity interval columns on every versioned table.
pub const VALID_FROM_COL: &str = "__valid_from";
pub const VALID_TO_COL: &str = "__valid_to";

/// Maximum locator length accepted by the audit ledger.
pub const MAX_LOCATOR_LEN: usize = 1023;

/// Maximum length of a table name.
pub const MAX_TABLE_NAME_LEN: usize = 64;
