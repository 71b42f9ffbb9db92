use std::io;

/// Errors that can occur while loading, parsing or persisting configuration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Circular reference detected: {uri} (read chain: {})", chain.join(" -> "))]
    CircularReference { uri: String, chain: Vec<String> },

    #[error("Error reading source \"{uri}\": {cause}")]
    Source {
        uri: String,
        #[source]
        cause: Box<Error>,
    },

    #[error("Source path cannot be empty")]
    EmptySource,

    #[error("No adapter found for {0}")]
    NoAdapter(String),

    #[error("Fragment '{fragment}' not found in {uri}")]
    FragmentNotFound { uri: String, fragment: String },

    #[error("Decode error ({format}): {message}")]
    Decode { format: &'static str, message: String },

    #[error("Encode error ({format}): {message}")]
    Encode { format: &'static str, message: String },

    #[error("The path \"{path}\" does not point to a valid configuration node: {reason}")]
    InvalidExtends { path: String, reason: String },

    #[error("Circular @extends between {0}")]
    CircularExtends(String),

    #[error("Invalid {directive} directive at {path}: {message}")]
    InvalidDirective {
        directive: &'static str,
        path: String,
        message: String,
    },

    #[error("Expected a map at {0}")]
    NotAMap(String),

    #[error("Circular lazy resolution while resolving {0}")]
    CircularResolution(String),

    #[error("Lazy value chain exceeded {0} links")]
    LazyChainTooLong(usize),

    #[error("Unresolved lazy value cannot be serialized: {0}")]
    UnresolvedLazy(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobPattern(#[from] glob::PatternError),
}

impl Error {
    /// Wrap a failure with the source it came from
    pub fn in_source(uri: impl Into<String>, cause: Error) -> Self {
        Error::Source {
            uri: uri.into(),
            cause: Box::new(cause),
        }
    }

    /// True if this error, or any error it wraps, is a circular source reference
    pub fn is_circular(&self) -> bool {
        match self {
            Error::CircularReference { .. } => true,
            Error::Source { cause, .. } => cause.is_circular(),
            _ => false,
        }
    }

    /// The innermost error, looking through `Source` wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Source { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for nodeconf operations
pub type Result<T> = std::result::Result<T, Error>;
