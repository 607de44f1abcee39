//! Error types for INI parsing and value access
//!
//! Structural problems in the input are reported as [`ParseError`] and abort
//! the whole parse. Conversion failures of the typed accessors are reported as
//! [`ValueError`]. Both are wrapped by the top-level [`IniError`].

use thiserror::Error;

/// Main error type for loading and reading configuration
#[derive(Debug, Error)]
pub enum IniError {
    /// Structural error in the source text
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Typed value conversion error
    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    /// I/O error while opening or reading a source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested section is not present
    #[error("section {name:?} does not exist")]
    SectionNotFound { name: String },

    /// Requested key is not present in the section or any of its parents
    #[error("key {key:?} does not exist in section {section:?}")]
    KeyNotFound { section: String, key: String },
}

/// Structural parse errors
///
/// Every variant carries the 1-based line number at which the problem was
/// detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A section header without a closing `]`
    #[error("unclosed section at line {line}: {text}")]
    UnclosedSection { line: usize, text: String },

    /// A quoted key name without its closing quote
    #[error("missing closing key quote at line {line}: {text}")]
    MissingKeyQuote { line: usize, text: String },

    /// A key line starting with a delimiter
    #[error("empty key name at line {line}: {text}")]
    EmptyKeyName { line: usize, text: String },

    /// A quoted value that runs to the end of the input
    #[error("missing closing quote at line {line}: value started with {start:?}")]
    MissingValueQuote { line: usize, start: String },

    /// A line without delimiter while boolean keys are disabled
    #[error("key-value delimiter not found at line {line}: {text}")]
    MissingDelimiter { line: usize, text: String },

    /// A line that is not valid UTF-8; `offset` is the first bad byte
    #[error("invalid UTF-8 at line {line}, byte {offset}")]
    InvalidUtf8 { line: usize, offset: usize },
}

impl ParseError {
    /// Returns the line number where the error was detected
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnclosedSection { line, .. }
            | ParseError::MissingKeyQuote { line, .. }
            | ParseError::EmptyKeyName { line, .. }
            | ParseError::MissingValueQuote { line, .. }
            | ParseError::MissingDelimiter { line, .. }
            | ParseError::InvalidUtf8 { line, .. } => *line,
        }
    }
}

/// Typed accessor conversion errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("parsing {value:?}: invalid boolean syntax")]
    InvalidBool { value: String },

    #[error("parsing {value:?}: {reason}")]
    InvalidInteger { value: String, reason: String },

    #[error("parsing {value:?}: {reason}")]
    InvalidFloat { value: String, reason: String },

    #[error("parsing duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("parsing time {value:?}: {reason}")]
    InvalidTime { value: String, reason: String },
}

/// Convenience alias used throughout the crate
pub type Result<T, E = IniError> = std::result::Result<T, E>;
