use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),

    #[error("Worker thread exited before becoming ready")]
    WorkerInit,
}
