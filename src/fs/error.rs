use crate::store;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// failures shared by the namespace, blob store, quota accountant and trash
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node not found")]
    NotFound,

    #[error("a node with the same name already exists in the directory")]
    Conflict,

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("invalid name")]
    InvalidName,

    #[error("a directory cannot be moved into itself or one of its descendants")]
    Cycle,

    #[error("malformed reference")]
    InvalidReference,

    #[error("node is not a directory")]
    NotDirectory,

    #[error("node is not a file")]
    NotFile,

    #[error("content exceeds the maximum upload size")]
    TooLarge,

    #[error("content stream failed: {0}")]
    Stream(#[source] BoxDynError),

    #[error("blob io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata store failure: {0}")]
    Store(#[source] store::Error),
}

impl Error {
    pub fn stream<E>(err: E) -> Self
    where
        E: Into<BoxDynError>
    {
        Error::Stream(err.into())
    }
}

impl From<store::Error> for Error {
    fn from(err: store::Error) -> Self {
        match err {
            store::Error::Conflict |
            store::Error::Stale => Error::Conflict,
            store::Error::QuotaExceeded => Error::QuotaExceeded,
            store::Error::OwnerNotFound => Error::NotFound,
            err => Error::Store(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
