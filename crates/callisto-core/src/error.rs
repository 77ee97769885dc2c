use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("stacking cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, StackError>;
