use std::io;
use std::path::PathBuf;

/// Errors raised while configuring or performing a file delivery.
///
/// Malformed or unsatisfiable `Range` headers are not errors: they resolve to
/// [`RangeOutcome::Unsatisfiable`](crate::RangeOutcome::Unsatisfiable) and
/// produce a `416` response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file '{}' is not readable: {source}", .path.display())]
    ResourceUnavailable { path: PathBuf, source: io::Error },

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("'{0}' cannot be used as a header value")]
    InvalidHeaderValue(String),

    /// The source ran out of data before the resolved span was written.
    #[error("source ended early: wrote {written} of {expected} bytes")]
    ShortRead { expected: u64, written: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn unavailable(path: PathBuf, kind: io::ErrorKind, reason: &'static str) -> Self {
        Error::ResourceUnavailable { path, source: io::Error::new(kind, reason) }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            err @ Error::ShortRead { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            err => io::Error::other(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
