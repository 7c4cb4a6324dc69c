use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuestError {
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("Invalid expression '{expression}': {reason}")]
    Expression { expression: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Quest not found: {0}")]
    QuestNotFound(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Unsupported schema version {found} (supported up to {supported})")]
    SchemaVersion { found: u32, supported: u32 },

    #[error("{0}")]
    Other(String),
}

impl QuestError {
    pub fn expression(expression: &str, reason: impl Into<String>) -> Self {
        QuestError::Expression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QuestError>;
