use thiserror::Error;

/// Errors raised while talking to the execution layer.
///
/// Transient transport and JSON-RPC failures are retried by the client's
/// retry loops and normally never escape them; the remaining variants are
/// terminal for the operation that produced them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("engine error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("execution layer is syncing")]
    Syncing,

    #[error("payload rejected by the execution layer: {0}")]
    InvalidPayload(String),

    #[error("forkchoice response carried no payload id")]
    MissingPayloadId,

    #[error("jwt error: {0}")]
    Jwt(String),

    #[error("cancelled while waiting for the execution layer")]
    Cancelled,
}

impl EngineError {
    /// Whether a retry loop may try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rpc { .. } | Self::InvalidResponse(_))
    }
}
