#[derive(Debug, thiserror::Error)]
pub enum ZedisError {
    /// Malformed or oversized frame; the connection is closed.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ZedisResult<T> = Result<T, ZedisError>;
