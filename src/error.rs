pub type UnderlayResult<T> = Result<T, UnderlayError>;

#[derive(thiserror::Error, Debug)]
pub enum UnderlayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("image decode failed: {0}")]
    DecodeFailed(String),

    #[error("background removal failed: {0}")]
    ProcessingFailed(String),

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UnderlayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::ExportFailed(msg.into())
    }
}
