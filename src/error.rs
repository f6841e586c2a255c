use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort scoring of a single message. The corpus run records
/// them and moves on to the next message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unparseable MIME structure: {0}")]
    Parse(#[from] mailparse::MailParseError),

    #[error("no canonical text body found")]
    MissingBody,

    #[error("missing or malformed Date header: {0:?}")]
    MalformedDate(String),
}
