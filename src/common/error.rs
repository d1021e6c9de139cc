use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("malformed envelope: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Originated requests must be stamped before they reach the RPC engine.
    #[error("request to {dest} has no msg_id")]
    MissingMsgId { dest: String },

    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, NodeError>;
