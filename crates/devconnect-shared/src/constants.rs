/// Application name
pub const APP_NAME: &str = "DevConnect";

/// Joins the two sorted participant ids of a conversation
pub const CONVERSATION_ID_SEPARATOR: char = '_';

/// Maximum number of targets in one bulk connection request
pub const MAX_BULK_REQUESTS: usize = 10;

/// Maximum number of users returned by a search
pub const MAX_SEARCH_RESULTS: usize = 20;

/// Number of skills reported in the analytics top-skills list
pub const TOP_SKILLS_LIMIT: usize = 5;

/// Trailing window used for "network growth this month"
pub const NETWORK_GROWTH_WINDOW_DAYS: i64 = 30;

/// Skill overlap score of two identical skill sets
pub const SKILL_SCORE_SCALE: f64 = 10.0;

/// Score contributed by each mutual connection
pub const MUTUAL_CONNECTION_WEIGHT: f64 = 2.0;

/// Skill score above which a candidate is a "high skill compatibility" match
pub const HIGH_SKILL_SCORE: f64 = 5.0;

/// Skill score above which a candidate is a "good skill match"
pub const GOOD_SKILL_SCORE: f64 = 2.0;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// Default per-connection buffer of pending real-time events
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
