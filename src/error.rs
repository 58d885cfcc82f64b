use thiserror::Error;

/// Failure to retrieve a feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

/// Failure to read a feed document as XML.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("document contains no XML elements")]
    Empty,

    #[error("document ended with {0} unclosed element(s)")]
    Truncated(usize),
}

/// Why a single feed source produced no items.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A form submission rejected before touching any store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter an email address.")]
    EmptyEmail,

    #[error("Email address cannot contain line breaks or control characters.")]
    EmailControlCharacters,

    #[error("Please enter a username.")]
    EmptyUsername,

    #[error("Please enter a comment.")]
    EmptyComment,
}

/// Outcome of a failed form submission: either the user's input or the store.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("storage failure: {0}")]
    Store(#[from] anyhow::Error),
}
