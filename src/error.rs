//! failures while starting up, before any request is served

use stratus_lib::context_trait;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Default)]
pub struct Error {
    cxt: Option<String>,
    src: Option<BoxDynError>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new() -> Error {
        Error::default()
    }

    pub fn context<C>(mut self, cxt: C) -> Error
    where
        C: Into<String>
    {
        self.cxt = Some(cxt.into());
        self
    }

    pub fn source<S>(mut self, src: S) -> Error
    where
        S: Into<BoxDynError>
    {
        self.src = Some(src.into());
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cxt.as_deref().unwrap_or("startup failed"))?;

        if let Some(err) = &self.src {
            write!(f, "\n{err}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.src.as_deref().map(|err| err as _)
    }
}

impl From<deadpool_postgres::BuildError> for Error {
    fn from(err: deadpool_postgres::BuildError) -> Self {
        Error::new()
            .context("failed to create postgres pool")
            .source(err)
    }
}

context_trait!(Error);

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<BoxDynError>
{
    fn context<C>(self, cxt: C) -> Result<T>
    where
        C: Into<String>
    {
        self.map_err(|err| Error::new().context(cxt).source(err))
    }
}

impl<T> Context<T, ()> for Option<T> {
    fn context<C>(self, cxt: C) -> Result<T>
    where
        C: Into<String>
    {
        self.ok_or_else(|| Error::new().context(cxt))
    }
}
