use std::io;
use thiserror::Error;

/// Wraps an [`io::Error`] raised by the output sink that a writer drains into.
#[derive(Debug, Error)]
#[error("output sink failure: {source}")]
pub struct IoError {
    #[from]
    source: io::Error,
}

impl IoError {
    pub fn source(&self) -> &io::Error {
        &self.source
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}
