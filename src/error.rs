use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Not a PDF document: missing %PDF header")]
    Format,

    #[error("Unsupported PDF version {0}")]
    UnsupportedVersion(String),

    #[error("Document is encrypted and requires a password")]
    DecryptRequired,

    #[error("Password entry was declined")]
    DecryptDeclined,

    #[error("Document has no pages")]
    NoPages,

    #[error("No extractable text found")]
    NoText,

    #[error("Out of memory while rendering page")]
    OutOfMemory,

    #[error("Conversion aborted by user")]
    UserAbort,

    #[error("Bad page index: {0}")]
    BadPage(usize),

    #[error("Document provider error: {0}")]
    Provider(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::collections::TryReserveError> for ConvertError {
    fn from(_: std::collections::TryReserveError) -> Self {
        ConvertError::OutOfMemory
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
