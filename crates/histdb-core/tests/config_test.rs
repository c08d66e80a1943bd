//! Config loading: TOML defaults, dataset declarations, structural validation.

use histdb_core::config::defaults;
use histdb_core::models::{BucketStrategy, ColumnType, RowFinality, UniqueStrategy};
use histdb_core::{HistConfig, HistError};

const PRICES_TOML: &str = r#"
[storage]
path = "/var/lib/histdb/prices.db"

[ingest]
num_retries = 5
retry_delay_ms = 250

[observability]
log_level = "histdb=debug"

[[datasets]]
name = "prices"
scrape_limit = 10
transforms = [
    { name = "null_if_gte", args = ["price", 1000000.0] },
    { name = "combine_columns", args = ["label", "${id}", "-", "${currency}"] },
]

[datasets.table]
name = "prices"
key_columns = ["id"]

[[datasets.table.columns]]
name = "id"
column_type = "int"
nullable = false

[[datasets.table.columns]]
name = "price"
column_type = "float"

[[datasets.table.columns]]
name = "currency"
column_type = "text"
default = "USD"

[[datasets.table.columns]]
name = "label"
column_type = "text"

[datasets.delta]
row_finality = "disabled"
unique_strategy = "first"

[datasets.time_partition]
time_column = "at"
bucket_interval = "1h"
bucket_strategy = "round_up"
"#;

#[test]
fn empty_config_uses_defaults() {
    let config = HistConfig::from_toml("").unwrap();
    assert!(config.storage.path.is_none());
    assert_eq!(config.storage.read_pool_size, defaults::DEFAULT_READ_POOL_SIZE);
    assert_eq!(config.ingest.num_retries, defaults::DEFAULT_NUM_RETRIES);
    assert_eq!(config.ingest.retry_delay_ms, defaults::DEFAULT_RETRY_DELAY_MS);
    assert!(config.datasets.is_empty());
    config.validate().unwrap();
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let config = HistConfig::from_toml("[ingest]\nnum_retries = 1\n").unwrap();
    assert_eq!(config.ingest.num_retries, 1);
    assert_eq!(config.ingest.fetch_timeout_ms, defaults::DEFAULT_FETCH_TIMEOUT_MS);
}

#[test]
fn dataset_declaration_parses() {
    let config = HistConfig::from_toml(PRICES_TOML).unwrap();
    config.validate().unwrap();

    assert_eq!(config.ingest.num_retries, 5);
    assert_eq!(config.ingest.retry_delay().as_millis(), 250);
    assert_eq!(config.observability.log_level, "histdb=debug");

    let ds = config.dataset("prices").unwrap();
    assert_eq!(ds.scrape_limit, Some(10));
    assert_eq!(ds.table.key_columns, vec!["id".to_string()]);
    assert_eq!(ds.table.column("price").unwrap().column_type, ColumnType::Float);
    assert!(!ds.table.column("id").unwrap().nullable);
    assert_eq!(ds.delta.row_finality, RowFinality::Disabled);
    assert_eq!(ds.delta.unique_strategy, UniqueStrategy::First);
    assert!(!ds.delta.drop_unchanged_rows);

    let tp = ds.time_partition.as_ref().unwrap();
    assert_eq!(tp.bucket_interval.to_string(), "1h");
    assert_eq!(tp.bucket_strategy, BucketStrategy::RoundUp);
    assert!(!tp.filter_past_events);

    assert_eq!(ds.transforms.len(), 2);
    assert_eq!(ds.transforms[1].name, "combine_columns");
}

#[test]
fn bad_bucket_interval_is_a_parse_error() {
    let toml = PRICES_TOML.replace("bucket_interval = \"1h\"", "bucket_interval = \"fortnight\"");
    assert!(HistConfig::from_toml(&toml).is_err());
}

#[test]
fn duplicate_dataset_names_rejected() {
    let mut config = HistConfig::from_toml(PRICES_TOML).unwrap();
    let copy = config.datasets[0].clone();
    config.datasets.push(copy);
    assert!(matches!(config.validate(), Err(HistError::ConfigError(_))));
}

#[test]
fn key_must_name_a_declared_column() {
    let mut config = HistConfig::from_toml(PRICES_TOML).unwrap();
    config.datasets[0].table.key_columns = vec!["sku".to_string()];
    assert!(matches!(config.validate(), Err(HistError::ConfigError(_))));
}

#[test]
fn zero_read_pool_rejected() {
    let config = HistConfig::from_toml("[storage]\nread_pool_size = 0\n").unwrap();
    assert!(config.validate().is_err());
}
