/// Application name
pub const APP_NAME: &str = "TaskGrid";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Room key prefix for per-user rooms
pub const USER_ROOM_PREFIX: &str = "user";

/// Room key prefix for per-list rooms
pub const LIST_ROOM_PREFIX: &str = "list";

/// Default per-connection outbound event queue length
pub const DEFAULT_WS_QUEUE_CAPACITY: usize = 64;

/// Default session lifetime in hours (30 days)
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 720;

/// Longest accepted session lifetime in hours (ten years)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Minimum accepted password length at registration
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum length of list and task names
pub const MAX_NAME_LEN: usize = 200;
