pub const DEFAULT_ENDPOINT: &str = "ws://localhost:5000/ws";

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CAPACITY: usize = 1024;

pub const ORIGIN_HEADER: &str = "Origin";
