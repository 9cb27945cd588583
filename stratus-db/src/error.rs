#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Invalid(String),

    #[error("owner \"{0}\" was not found")]
    UnknownOwner(String),

    #[error("owner \"{0}\" already exists")]
    OwnerExists(String),

    #[error("query from {file} failed: {source}\n{sql}")]
    Setup {
        file: String,
        sql: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("postgres failure: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
