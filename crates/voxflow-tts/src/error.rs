//! Error types for the speak pipeline

use thiserror::Error;
use voxflow_foundation::QueueError;

/// TTS error taxonomy. Argument errors are rejected before a task is
/// queued; everything else surfaces either at the call site or, for work
/// running on the queue worker, through the speak result.
#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No output stream has been bound yet.
    #[error("Output stream not initialized")]
    NotInitialized,

    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Engine failure: {0}")]
    EngineFailure(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TtsResult<T> = Result<T, TtsError>;
