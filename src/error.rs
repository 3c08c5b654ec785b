//! Error types for Clue.
//!
//! Every failure in the engine is reported through [`ClueError`]. Nothing is
//! retried or swallowed internally; the caller (usually the shell) decides
//! whether to continue.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClueError>;

/// The main error type for index inspection.
#[derive(Error, Debug)]
pub enum ClueError {
    /// A directory, file or segment does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A segment was written with a format version this build cannot read.
    #[error("segment '{segment}' has format version {found}, supported version is {supported}")]
    IncompatibleVersion {
        segment: String,
        found: u32,
        supported: u32,
    },

    /// A structural invariant of a segment was violated.
    #[error("corrupt segment '{segment}': {reason}")]
    CorruptSegment { segment: String, reason: String },

    /// The index or segment was used after it was closed.
    #[error("index is closed")]
    UseAfterClose,

    /// Close was requested while reads were in flight.
    #[error("index is busy: reads are in flight")]
    Busy,

    /// The index directory exists but holds no segments.
    #[error("no segments found in '{0}'")]
    EmptyIndex(String),

    /// One segment failed to load, so the whole open was abandoned.
    #[error("failed to open segment '{segment}' after loading {loaded} segment(s): {source}")]
    PartialOpen {
        segment: String,
        loaded: usize,
        #[source]
        source: Box<ClueError>,
    },

    /// A caller supplied an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The configuration cannot be honored.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Low-level decoding failure not yet attributed to a segment.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// I/O errors from the backing storage.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClueError {
    /// Create a not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ClueError::NotFound(msg.into())
    }

    /// Create a corrupt segment error.
    pub fn corrupt<S: Into<String>, R: Into<String>>(segment: S, reason: R) -> Self {
        ClueError::CorruptSegment {
            segment: segment.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        ClueError::InvalidArgument(msg.into())
    }

    /// Create an invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        ClueError::InvalidConfig(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data<S: Into<String>>(msg: S) -> Self {
        ClueError::InvalidData(msg.into())
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClueError::NotFound(_) => ErrorKind::NotFound,
            ClueError::IncompatibleVersion { .. } => ErrorKind::IncompatibleVersion,
            ClueError::CorruptSegment { .. } => ErrorKind::CorruptSegment,
            ClueError::UseAfterClose => ErrorKind::UseAfterClose,
            ClueError::Busy => ErrorKind::Busy,
            ClueError::EmptyIndex(_) => ErrorKind::EmptyIndex,
            ClueError::PartialOpen { .. } => ErrorKind::PartialOpen,
            ClueError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ClueError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ClueError::InvalidData(_) => ErrorKind::InvalidData,
            ClueError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Error categories, mostly for display in the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    IncompatibleVersion,
    CorruptSegment,
    UseAfterClose,
    Busy,
    EmptyIndex,
    PartialOpen,
    InvalidArgument,
    InvalidConfig,
    InvalidData,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::IncompatibleVersion => "IncompatibleVersion",
            ErrorKind::CorruptSegment => "CorruptSegment",
            ErrorKind::UseAfterClose => "UseAfterClose",
            ErrorKind::Busy => "Busy",
            ErrorKind::EmptyIndex => "EmptyIndex",
            ErrorKind::PartialOpen => "PartialOpen",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvalidConfig => "InvalidConfig",
            ErrorKind::InvalidData => "InvalidData",
            ErrorKind::Io => "Io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
