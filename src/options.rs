//! Loader and parser options

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::transform::{EnvironmentVariableHandler, Transformer, VariableHandler};

/// Smallest buffer the line reader will use, in bytes
pub const MIN_READER_BUFFER_SIZE: usize = 4096;

/// Default set of characters separating a key from its value
pub const DEFAULT_KEY_VALUE_DELIMITERS: &str = "=:";

/// Default separator between a child section name and its parent
pub const DEFAULT_CHILD_SECTION_DELIMITER: &str = ".";

/// Callback receiving debug messages about Python-style multiline matching
pub type DebugSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Options used while loading and reading data sources
#[derive(Clone)]
pub struct Options {
    /// Treat a missing file as an empty source instead of an error
    pub loose: bool,
    /// Lowercase both section and key names
    pub insensitive: bool,
    /// Lowercase section names
    pub insensitive_sections: bool,
    /// Lowercase key names
    pub insensitive_keys: bool,
    /// Do not join lines ending in a backslash
    pub ignore_continuation: bool,
    /// Keep `#` and `;` after a value as part of the value
    pub ignore_inline_comment: bool,
    /// Turn lines without a delimiter into boolean keys (as used by `my.cnf`)
    pub allow_boolean_keys: bool,
    /// Accepted for compatibility; repeated section headers always merge
    /// into the first section with that name
    pub allow_non_unique_sections: bool,
    /// Continue a value on following lines that are indented deeper
    pub allow_python_multiline_values: bool,
    /// Only recognise inline comments preceded by a space
    pub space_before_inline_comment: bool,
    /// Unescape `\"` inside values surrounded by double quotes
    pub unescape_value_double_quotes: bool,
    /// Unescape `\#` and `\;` inside unquoted values
    pub unescape_value_comment_symbols: bool,
    /// Characters separating key from value
    pub key_value_delimiters: String,
    /// Separator used to find the parent of a section
    pub child_section_delimiter: String,
    /// Keep single or double quotes surrounding a value
    pub preserve_surrounded_quote: bool,
    /// Size of the read buffer, floored at [`MIN_READER_BUFFER_SIZE`]
    pub reader_buffer_size: usize,
    /// Replaces the raw value before reference and environment substitution
    pub transformer: Option<Transformer>,
    /// Receives Python-style multiline tracing messages
    pub debug: Option<DebugSink>,
    /// Resolves `${name}` markers
    pub variables: Arc<dyn VariableHandler + Send + Sync>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            loose: false,
            insensitive: false,
            insensitive_sections: false,
            insensitive_keys: false,
            ignore_continuation: false,
            ignore_inline_comment: false,
            allow_boolean_keys: true,
            allow_non_unique_sections: false,
            allow_python_multiline_values: false,
            space_before_inline_comment: false,
            unescape_value_double_quotes: false,
            unescape_value_comment_symbols: false,
            key_value_delimiters: DEFAULT_KEY_VALUE_DELIMITERS.to_string(),
            child_section_delimiter: DEFAULT_CHILD_SECTION_DELIMITER.to_string(),
            preserve_surrounded_quote: false,
            reader_buffer_size: MIN_READER_BUFFER_SIZE,
            transformer: None,
            debug: None,
            variables: Arc::new(EnvironmentVariableHandler),
        }
    }
}

impl Options {
    /// Sets the custom value transformer
    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Sets the debug sink
    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.debug = Some(sink);
        self
    }

    /// Sets the handler resolving `${name}` markers
    pub fn with_variables(mut self, handler: Arc<dyn VariableHandler + Send + Sync>) -> Self {
        self.variables = handler;
        self
    }

    /// Fills in defaults for empty delimiters and floors the buffer size
    pub(crate) fn normalized(mut self) -> Self {
        if self.key_value_delimiters.is_empty() {
            self.key_value_delimiters = DEFAULT_KEY_VALUE_DELIMITERS.to_string();
        }
        if self.child_section_delimiter.is_empty() {
            self.child_section_delimiter = DEFAULT_CHILD_SECTION_DELIMITER.to_string();
        }
        self.reader_buffer_size = self.reader_buffer_size.max(MIN_READER_BUFFER_SIZE);
        self
    }

    /// Applies section-name case folding
    pub fn section_name<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if (self.insensitive || self.insensitive_sections) && !name.is_empty() {
            Cow::Owned(name.to_lowercase())
        } else {
            Cow::Borrowed(name)
        }
    }

    /// Applies key-name case folding
    pub fn key_name<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.insensitive || self.insensitive_keys {
            Cow::Owned(name.to_lowercase())
        } else {
            Cow::Borrowed(name)
        }
    }

    pub(crate) fn emit_debug(&self, args: fmt::Arguments<'_>) {
        tracing::trace!("{}", args);
        if let Some(sink) = &self.debug {
            sink(&args.to_string());
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("loose", &self.loose)
            .field("insensitive", &self.insensitive)
            .field("insensitive_sections", &self.insensitive_sections)
            .field("insensitive_keys", &self.insensitive_keys)
            .field("ignore_continuation", &self.ignore_continuation)
            .field("ignore_inline_comment", &self.ignore_inline_comment)
            .field("allow_boolean_keys", &self.allow_boolean_keys)
            .field("allow_non_unique_sections", &self.allow_non_unique_sections)
            .field(
                "allow_python_multiline_values",
                &self.allow_python_multiline_values,
            )
            .field(
                "space_before_inline_comment",
                &self.space_before_inline_comment,
            )
            .field(
                "unescape_value_double_quotes",
                &self.unescape_value_double_quotes,
            )
            .field(
                "unescape_value_comment_symbols",
                &self.unescape_value_comment_symbols,
            )
            .field("key_value_delimiters", &self.key_value_delimiters)
            .field("child_section_delimiter", &self.child_section_delimiter)
            .field("preserve_surrounded_quote", &self.preserve_surrounded_quote)
            .field("reader_buffer_size", &self.reader_buffer_size)
            .field("transformer", &self.transformer.is_some())
            .field("debug", &self.debug.is_some())
            .finish_non_exhaustive()
    }
}
