use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("Rust StdIO Error ({0})")]
    StdIO(io::ErrorKind),
    #[error("FTP Error ({0})")]
    Ftp(String),
    #[error("Could not construct an item without a file name")]
    NoFileName,
    #[error("Failed to convert string to UTF-8")]
    NotUtf8,
    #[error("Cannot find item with path \"{0}\"")]
    NotFound(String),
    #[error("An item already exists at path \"{0}\"")]
    AlreadyExists(String),
    #[error("Provided path contains invalid character {0:?}")]
    InvalidPathChar(char),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Transfer failed: {0}")]
    TransferFailed(String),
    #[error("Operation '{0}' is unsupported on platform '{1}'")]
    Unsupported(String, String),
    /// A lookup returned an item of the wrong shape.
    #[error("Expected a {expected} at path \"{path}\"")]
    UnexpectedItem { path: String, expected: &'static str },
    #[error("The FTP session is not connected")]
    NotConnected,
    #[error("The operation was cancelled")]
    Cancelled,
}

impl Error {
    pub fn is_already_exists_error(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::StdIO(io::ErrorKind::AlreadyExists))
    }

    pub fn is_not_found_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::StdIO(io::ErrorKind::NotFound))
    }

    pub fn is_invalid_argument_error(&self) -> bool {
        matches!(self, Self::InvalidPathChar(_) | Self::InvalidArgument(_))
    }

    /// Whether the caller can reasonably carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        self.is_already_exists_error() || self.is_not_found_error()
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::StdIO(value.kind())
    }
}

impl From<suppaftp::FtpError> for Error {
    fn from(value: suppaftp::FtpError) -> Self {
        match value {
            suppaftp::FtpError::ConnectionError(err) => Self::StdIO(err.kind()),
            other => Self::Ftp(other.to_string()),
        }
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::StdIO(kind) => kind.into(),
            Error::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, value.to_string()),
            Error::AlreadyExists(_) => {
                io::Error::new(io::ErrorKind::AlreadyExists, value.to_string())
            }
            Error::Unsupported(..) => io::Error::new(io::ErrorKind::Unsupported, value.to_string()),
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(Error::NotFound("/a".into()).is_recoverable());
        assert!(Error::AlreadyExists("/a".into()).is_recoverable());
        assert!(Error::StdIO(io::ErrorKind::NotFound).is_recoverable());
        assert!(!Error::TransferFailed("boom".into()).is_recoverable());
        assert!(!Error::UnexpectedItem {
            path: "/a".into(),
            expected: "file"
        }
        .is_recoverable());
    }

    #[test]
    fn io_round_trip_keeps_kind() {
        let err: io::Error = Error::NotFound("/missing".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let back: Error = err.into();
        assert!(back.is_not_found_error());
    }
}
