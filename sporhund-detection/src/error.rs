use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to build prefilter index: {0}")]
    IndexBuild(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
