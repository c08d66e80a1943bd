//! Default values shared by config structs.

pub const DEFAULT_READ_POOL_SIZE: usize = 4;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_NUM_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 60_000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;
pub const DEFAULT_LOG_LEVEL: &str = "info";
