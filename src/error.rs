use miette::Diagnostic;
use thiserror::Error;

/// Main error type for colorsense operations
#[derive(Error, Diagnostic, Debug)]
pub enum ColorizeError {
    #[error("IO error: {0}")]
    #[diagnostic(code(colorsense::io))]
    IoError(#[from] std::io::Error),

    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(colorsense::io))]
    Io {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("{message}")]
    #[diagnostic(code(colorsense::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Session not found: {session_id}")]
    #[diagnostic(code(colorsense::not_found))]
    NotFound { session_id: String },

    #[error("Segmentation failed: {message}")]
    #[diagnostic(code(colorsense::segmentation))]
    Segmentation { message: String },

    #[error("Apply failed: {message}")]
    #[diagnostic(code(colorsense::apply))]
    Apply { message: String },

    #[error("Selector initialization failed: {message}")]
    #[diagnostic(code(colorsense::selector))]
    SelectorInit { message: String },

    #[error("Failed to load image: {message}")]
    #[diagnostic(code(colorsense::decode))]
    Decode { message: String },

    #[error("Failed to encode image: {message}")]
    #[diagnostic(code(colorsense::encode))]
    Encode { message: String },

    #[error("Config error: {message}")]
    #[diagnostic(code(colorsense::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },
}

/// Coarse failure class, used by transport adapters to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request data; nothing was touched.
    Input,
    /// Unknown session id.
    NotFound,
    /// Selecting or painting a region failed; the session is unchanged.
    Recoverable,
    /// Decode, encode, storage or configuration failure.
    Internal,
}

impl ColorizeError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    pub fn not_found(session_id: impl Into<String>) -> Self {
        Self::NotFound {
            session_id: session_id.into(),
        }
    }

    pub fn segmentation(message: impl Into<String>) -> Self {
        Self::Segmentation {
            message: message.into(),
        }
    }

    pub fn selector_init(message: impl Into<String>) -> Self {
        Self::SelectorInit {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input { .. } | Self::Decode { .. } => ErrorKind::Input,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Segmentation { .. } | Self::Apply { .. } | Self::SelectorInit { .. } => {
                ErrorKind::Recoverable
            }
            Self::IoError(_) | Self::Io { .. } | Self::Encode { .. } | Self::Config { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP-style status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Input => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Recoverable => 422,
            ErrorKind::Internal => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ColorizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_kind() {
        assert_eq!(ColorizeError::input("bad").status_code(), 400);
        assert_eq!(ColorizeError::not_found("abc").status_code(), 404);
        assert_eq!(ColorizeError::segmentation("no mask").status_code(), 422);
        let io = ColorizeError::Io {
            path: "out.jpg".into(),
            message: "denied".to_string(),
        };
        assert_eq!(io.status_code(), 500);
    }

    #[test]
    fn test_not_found_message() {
        let err = ColorizeError::not_found("1234");
        assert_eq!(err.to_string(), "Session not found: 1234");
    }

    #[test]
    fn test_decode_is_client_error() {
        let err = ColorizeError::Decode {
            message: "not an image".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Input);
    }
}
