use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdeologyError {
    /// Caller-supplied filter outside its allowed domain. Raised before any
    /// data is read.
    #[error("Invalid {field} '{value}': expected {expected}")]
    InvalidFilterInput {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// No classification matched the requested partition.
    #[error("No bill classifications found for spec_hash '{spec_hash}'")]
    EmptyResultSet { spec_hash: String },

    /// Record store failure (I/O or document decoding).
    #[error("Store error in '{collection}': {message}")]
    Store { collection: String, message: String },

    /// Configuration file could not be read or parsed.
    #[error("Config error at '{path}': {message}")]
    Config { path: String, message: String },
}

impl IdeologyError {
    pub(crate) fn store(collection: &str, message: impl ToString) -> Self {
        Self::Store {
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IdeologyError>;
