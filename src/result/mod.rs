use std::convert::From;
use std::{fmt, io};

use crate::result::encoding_error::EncodingError;
use crate::result::illegal_operation::IllegalOperation;
use io_error::IoError;
use thiserror::Error;

pub mod encoding_error;
pub mod illegal_operation;
pub mod io_error;

/// A unified Result type representing the outcome of method calls that may fail.
pub type IonResult<T> = Result<T, IonError>;

/// Represents the different types of high-level failures that might occur when writing Ion data.
#[derive(Debug, Error)]
pub enum IonError {
    /// Indicates that an IO error was encountered while writing to the output sink.
    #[error("{0}")]
    Io(#[from] IoError),

    /// Indicates that the writer could not serialize a given piece of data, for example
    /// because its symbolic content is invalid or its encoding exceeds a format limit.
    #[error("{0}")]
    Encoding(#[from] EncodingError),

    /// Returned when the user has performed an illegal operation (for example: calling
    /// step_out() while the writer is at the top level.)
    #[error("{0}")]
    IllegalOperation(#[from] IllegalOperation),
}

impl IonError {
    /// Returns `true` if this error was caused by calling a method while the writer was in a
    /// state that does not permit it.
    pub fn is_illegal_operation(&self) -> bool {
        matches!(self, IonError::IllegalOperation(_))
    }
}

impl From<io::Error> for IonError {
    fn from(io_error: io::Error) -> Self {
        IoError::from(io_error).into()
    }
}

impl From<io::ErrorKind> for IonError {
    fn from(error_kind: io::ErrorKind) -> Self {
        let io_error = io::Error::from(error_kind);
        IoError::from(io_error).into()
    }
}

impl From<fmt::Error> for IonError {
    fn from(error: fmt::Error) -> Self {
        EncodingError::new(error.to_string()).into()
    }
}

/// A convenience method for creating an IonResult containing an IonError::EncodingError with the
/// provided description text.
pub fn encoding_error<T, S: Into<String>>(description: S) -> IonResult<T> {
    Err(encoding_error_raw(description))
}

/// A convenience method for creating an IonError::EncodingError with the provided operation
/// text. Useful for calling Option#ok_or_else.
#[inline(never)]
pub(crate) fn encoding_error_raw<S: Into<String>>(description: S) -> IonError {
    EncodingError::new(description).into()
}

/// A convenience method for creating an IonResult containing an IonError::IllegalOperation with the
/// provided operation text.
pub fn illegal_operation<T, S: Into<String>>(operation: S) -> IonResult<T> {
    Err(illegal_operation_raw(operation))
}

/// A convenience method for creating an IonError::IllegalOperation with the provided operation
/// text. Useful for calling Option#ok_or_else.
#[inline(never)]
pub(crate) fn illegal_operation_raw<S: Into<String>>(operation: S) -> IonError {
    IllegalOperation::new(operation.into()).into()
}
