use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("file not readable: {}", .path.display())]
    NotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read input")]
    ReadInput(#[source] std::io::Error),

    #[error("invalid UTF-8 in {}", .path.display())]
    InvalidEncoding {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("invalid UTF-8 input")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("missing required key: {key}")]
    MissingRequiredKey { key: String },

    #[error("value for `{key}` contains a NUL byte and cannot be set in the process environment")]
    InvalidValue { key: String },
}

impl Error {
    /// The parse failure behind this error, if it is one.
    pub fn as_parse(&self) -> Option<&ParseError> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}line {line}: {kind}", source_prefix(.path.as_ref()))]
pub struct ParseError {
    pub path: Option<PathBuf>,
    pub line: u32,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(line: u32, kind: ParseErrorKind) -> Self {
        Self {
            path: None,
            line,
            kind,
        }
    }

    pub(crate) fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

fn source_prefix(path: Option<&PathBuf>) -> String {
    match path {
        Some(path) => format!("{}, ", path.display()),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("invalid key `{0}`")]
    InvalidKey(String),
    #[error("unterminated quote")]
    UnterminatedQuote,
}
