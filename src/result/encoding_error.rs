use thiserror::Error;

/// Indicates that a value could not be encoded, for example because an annotation sequence was
/// too long or a piece of text was not valid Unicode.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{description}")]
pub struct EncodingError {
    description: String,
}

impl EncodingError {
    pub(crate) fn new(description: impl Into<String>) -> Self {
        EncodingError {
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        self.description.as_str()
    }
}
