use std::fmt;

macro_rules! err {
    ($kind:ident, $msg:literal) => {
        $crate::error::BundleError::$kind($msg.to_string())
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        $crate::error::BundleError::$kind(format!($fmtstr, $($args)*))
    };
}

macro_rules! fail {
    ($kind:ident, $msg:literal) => {
        return Err(err!($kind, $msg))
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        return Err(err!($kind, $fmtstr, $($args)*))
    };
}

/// Result alias used throughout the crate.
pub type BundleResult<T> = Result<T, BundleError>;

/// Errors surfaced while modelling or resolving a bundle.
#[derive(Debug)]
pub enum BundleError {
    /// Invalid input from the caller: bad path segment, out-of-range id field,
    /// overlapping targeting sets.
    InvalidArgument(String),
    /// A typed attribute getter was called on a value of another type.
    UnexpectedType {
        expected: &'static str,
        actual: String,
    },
    /// The bundle content violates the expected schema.
    InvalidBundle(String),
    /// Bytes at a well-known location could not be decoded.
    Decode {
        path: Option<String>,
        message: String,
    },
    /// No free type or entry id is left in a resource table.
    ResourceExhausted(String),
    /// The device cannot be served by the targeted content.
    IncompatibleDevice(String),
}

impl BundleError {
    pub(crate) fn decode(path: impl fmt::Display, message: impl fmt::Display) -> Self {
        BundleError::Decode {
            path: Some(path.to_string()),
            message: message.to_string(),
        }
    }

    pub(crate) fn unexpected_type(expected: &'static str, actual: impl fmt::Display) -> Self {
        BundleError::UnexpectedType {
            expected,
            actual: actual.to_string(),
        }
    }

    /// Attaches `path` to a decode error that does not name one yet.
    pub(crate) fn with_path(self, path: impl fmt::Display) -> Self {
        match self {
            BundleError::Decode { path: None, message } => BundleError::Decode {
                path: Some(path.to_string()),
                message,
            },
            other => other,
        }
    }

    /// Returns true for errors caused by malformed bundle content rather than caller misuse.
    pub fn is_invalid_bundle(&self) -> bool {
        matches!(self, BundleError::InvalidBundle(_) | BundleError::Decode { .. })
    }
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            BundleError::UnexpectedType { expected, actual } => {
                write!(f, "Unexpected type: expected {expected} but found {actual}")
            }
            BundleError::InvalidBundle(msg) => write!(f, "{msg}"),
            BundleError::Decode {
                path: Some(path),
                message,
            } => write!(f, "Error decoding '{path}': {message}"),
            BundleError::Decode { path: None, message } => write!(f, "Decode error: {message}"),
            BundleError::ResourceExhausted(msg) => write!(f, "Resource exhausted: {msg}"),
            BundleError::IncompatibleDevice(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for BundleError {}

impl From<bincode::Error> for BundleError {
    fn from(value: bincode::Error) -> Self {
        BundleError::Decode {
            path: None,
            message: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(value: serde_json::Error) -> Self {
        BundleError::Decode {
            path: None,
            message: value.to_string(),
        }
    }
}
