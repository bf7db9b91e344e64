//! Error types for afconv

use thiserror::Error;

/// Result type alias for afconv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for afconv
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container format error
    #[error("Format error: {0}")]
    Format(String),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The container does not store the named property
    #[error("Property not supported by container: {0}")]
    PropertyUnsupported(&'static str),

    /// End of stream
    #[error("End of stream")]
    EndOfStream,

    /// Buffer too small
    #[error("Buffer too small: need {need}, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A named pipeline step failed
    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    /// Create a codec error
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Error::Codec(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Wrap this error with the name of the step that produced it
    pub fn during(self, operation: &'static str) -> Self {
        Error::Operation {
            operation,
            source: Box::new(self),
        }
    }

    /// Name of the failing step, if this error carries one
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Error::Operation { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// The innermost error, with all step wrappers removed
    pub fn root(&self) -> &Error {
        match self {
            Error::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stable numeric status code reported by the command line tool
    pub fn status_code(&self) -> i32 {
        match self.root() {
            Error::Io(e) => e.raw_os_error().unwrap_or(-36),
            Error::Format(_) => -39,
            Error::Codec(_) => -50,
            Error::InvalidInput(_) => -60,
            Error::Unsupported(_) => -70,
            Error::PropertyUnsupported(_) => -71,
            Error::EndOfStream => -38,
            Error::BufferTooSmall { .. } => -80,
            Error::InvalidState(_) => -90,
            Error::Config(_) => -100,
            Error::Operation { source, .. } => source.status_code(),
        }
    }

    /// True for end-of-stream, whether bare or wrapped in a step
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self.root(), Error::EndOfStream)
    }
}

/// Attach a step name to the error side of a result
pub trait OperationContext<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T> OperationContext<T> for Result<T> {
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| e.during(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_wrapping() {
        let err: Result<()> = Err(Error::format("bad header"));
        let err = err.during("AudioFileOpen").unwrap_err();

        assert_eq!(err.operation(), Some("AudioFileOpen"));
        assert!(matches!(err.root(), Error::Format(_)));
        assert_eq!(err.status_code(), -39);
        assert!(err.to_string().starts_with("AudioFileOpen failed"));
    }

    #[test]
    fn test_end_of_stream_detection() {
        assert!(Error::EndOfStream.is_end_of_stream());
        assert!(Error::EndOfStream.during("read").is_end_of_stream());
        assert!(!Error::codec("x").is_end_of_stream());
    }

    #[test]
    fn test_io_status_code_uses_os_error() {
        let io = std::io::Error::from_raw_os_error(2);
        assert_eq!(Error::from(io).status_code(), 2);
    }
}
