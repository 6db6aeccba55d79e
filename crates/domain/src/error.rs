/// Shared error type used across all AgentRuntime crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("MemoryService: {0}")]
    MemoryService(String),

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("tool execution error: {0}")]
    ToolExecutionError(String),

    #[error("approval denied: {0}")]
    ApprovalDenied(String),

    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),

    #[error("depth exceeded: {0}")]
    DepthExceeded(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("session limit: {0}")]
    SessionLimit(String),

    #[error("schedule paused: {0}")]
    SchedulePaused(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
