use thiserror::Error;

#[derive(Debug, Error)]
pub enum DurabilityError {
    #[error("I/O error persisting sketch: {0}")]
    Io(#[from] std::io::Error),
    #[error("sketch file is corrupt: {0}")]
    CorruptSketch(#[from] mesh_sketch::CorruptSketch),
    #[error("committer background task panicked")]
    TaskPanicked,
}
