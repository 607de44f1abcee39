//! # INI Parser
//!
//! An INI configuration parser with Python-style extensions, value
//! references and environment substitution.
//!
//! ## Overview
//!
//! Sources are parsed line by line into an ordered registry of sections and
//! keys. Values are stored raw; every read resolves them through an optional
//! transformer hook, `%(name)s` references and `${NAME}` environment markers.
//!
//! ## Key Features
//!
//! - **Quoted Values**: `"..."`, `` `...` `` and `"""..."""` (which may span lines)
//! - **Continuations**: backslash line continuation and Python-style indented values
//! - **Comments**: full-line and inline comments, attached to the following key or section
//! - **References**: `%(key)s` with lookup through parent sections and the default section
//! - **Environment**: `${NAME}`, `${NAME??default}` and `${NAME||default}`
//! - **Typed Access**: booleans, integers with radix prefixes, durations, timestamps and lists
//! - **Multiple Sources**: files, byte buffers, streams and custom data sources
//!
//! ## Basic Usage
//!
//! ```rust
//! use ini_parser::from_str;
//!
//! let text = r#"
//! name = demo
//!
//! [server]
//! host = "localhost"
//! port = 8080
//! debug
//! "#;
//!
//! let config = from_str(text)?;
//! let server = config.section("server");
//! assert_eq!(config.section("").string("name"), "demo");
//! assert_eq!(server.string("host"), "localhost");
//! assert_eq!(server.key("port").parse::<u16>()?, 8080);
//! assert!(server.key("debug").is_boolean());
//! # Ok::<(), ini_parser::IniError>(())
//! ```
//!
//! ## Advanced Features
//!
//! ### References and Environment Variables
//!
//! ```rust
//! use std::sync::Arc;
//! use ini_parser::{Manager, MapVariableHandler, Options, Source};
//!
//! let mut variables = MapVariableHandler::new();
//! variables.insert("DATA_HOME", "/var/lib");
//!
//! let options = Options::default().with_variables(Arc::new(variables));
//! let config = Manager::new(options);
//! config.append(Source::bytes(
//!     "[paths]\nroot = ${DATA_HOME}/app\nlogs = %(root)s/logs\ncache = ${CACHE_DIR||/tmp}\n",
//! ))?;
//!
//! let paths = config.section("paths");
//! assert_eq!(paths.string("logs"), "/var/lib/app/logs");
//! assert_eq!(paths.string("cache"), "/tmp");
//! # Ok::<(), ini_parser::IniError>(())
//! ```
//!
//! ### Multiline Values
//!
//! ```rust
//! use ini_parser::{Manager, Options, Source};
//!
//! let options = Options {
//!     allow_python_multiline_values: true,
//!     ..Options::default()
//! };
//! let config = Manager::new(options);
//! config.append(Source::bytes(
//!     "quoted = \"\"\"first\nsecond\"\"\"\njoined = one \\\n  two\nindented = head\n  tail\n",
//! ))?;
//!
//! let section = config.section("");
//! assert_eq!(section.string("quoted"), "first\nsecond");
//! assert_eq!(section.string("joined"), "one two");
//! assert_eq!(section.string("indented"), "head\n  tail");
//! # Ok::<(), ini_parser::IniError>(())
//! ```
//!
//! ## Error Handling
//!
//! Structural errors abort the parse of a source and report the line:
//!
//! ```rust
//! use ini_parser::{from_str, IniError, ParseError};
//!
//! match from_str("[server\nport = 80\n") {
//!     Err(IniError::Parse(ParseError::UnclosedSection { line, .. })) => assert_eq!(line, 1),
//!     other => panic!("unexpected result: {:?}", other.map(|_| ())),
//! }
//! ```

pub mod error;
pub mod lock;
pub mod manager;
pub mod options;
pub mod parser;
pub mod reader;
pub mod registry;
pub mod source;
pub mod transform;
pub mod value;

#[cfg(test)]
mod error_tests;

// Re-export main types and functions
pub use error::{IniError, ParseError, Result, ValueError};
pub use lock::RegistryLock;
pub use manager::{KeyRef, Manager, SectionRef};
pub use options::{DebugSink, Options};
pub use parser::parse_reader;
pub use reader::ByteOrderMark;
pub use registry::{DEFAULT_SECTION, Key, Registry, Section};
pub use source::{CloseRead, DataSource, Source};
pub use value::FromValue;

// Re-export transformation types
pub use transform::{
    EnvironmentVariableHandler, MAX_SUBSTITUTION_DEPTH, MapVariableHandler, TransformContext,
    Transformer, VariableHandler, resolve_value, substitute_environment,
};

/// Loads one source with the given options
pub fn load(options: Options, source: impl Into<Source>) -> Result<Manager> {
    let manager = Manager::new(options);
    manager.append(source)?;
    Ok(manager)
}

/// Parses INI text with default options
pub fn from_str(text: &str) -> Result<Manager> {
    load(Options::default(), text.as_bytes())
}
