//! Data sources
//!
//! A [`Source`] describes where configuration text comes from. The parser
//! only ever sees the byte stream returned by opening it.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// A user-defined origin of configuration text
pub trait DataSource: Send + Sync {
    /// Opens a fresh stream over the content
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// A stream with an explicit close step, run after parsing
pub trait CloseRead: Read + Send {
    fn close(&mut self) -> io::Result<()>;
}

/// Factory producing a new stream on every open
pub type SourceFactory = Box<dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync>;

/// Where configuration text is read from
pub enum Source {
    /// A file, opened on every load
    Path(PathBuf),
    /// In-memory content
    Bytes(Vec<u8>),
    /// A generic stream; later reloads read whatever is left of it
    Stream(Mutex<Box<dyn Read + Send>>),
    /// A stream closed after every parse
    Closable(Mutex<Box<dyn CloseRead>>),
    /// A user capability
    Custom(Box<dyn DataSource>),
    /// A closure producing a fresh stream
    Factory(SourceFactory),
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Source::Bytes(bytes.into())
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Source::Stream(Mutex::new(Box::new(reader)))
    }

    pub fn closable(reader: impl CloseRead + 'static) -> Self {
        Source::Closable(Mutex::new(Box::new(reader)))
    }

    pub fn custom(source: impl DataSource + 'static) -> Self {
        Source::Custom(Box::new(source))
    }

    pub fn factory(
        factory: impl Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    ) -> Self {
        Source::Factory(Box::new(factory))
    }

    /// Opens the source for one parse
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        let reader: Box<dyn Read + '_> = match self {
            Source::Path(path) => Box::new(File::open(path)?),
            Source::Bytes(bytes) => Box::new(bytes.as_slice()),
            Source::Stream(reader) => Box::new(StreamGuard(
                reader.lock().unwrap_or_else(PoisonError::into_inner),
            )),
            Source::Closable(reader) => Box::new(ClosingGuard(
                reader.lock().unwrap_or_else(PoisonError::into_inner),
            )),
            Source::Custom(source) => source.open()?,
            Source::Factory(factory) => factory()?,
        };
        Ok(reader)
    }

    /// True for file sources, the only ones loose mode applies to
    pub fn is_path(&self) -> bool {
        matches!(self, Source::Path(_))
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Source::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Source::Stream(_) => f.write_str("Stream"),
            Source::Closable(_) => f.write_str("Closable"),
            Source::Custom(_) => f.write_str("Custom"),
            Source::Factory(_) => f.write_str("Factory"),
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<&[u8]> for Source {
    fn from(bytes: &[u8]) -> Self {
        Source::Bytes(bytes.to_vec())
    }
}

struct StreamGuard<'a>(MutexGuard<'a, Box<dyn Read + Send>>);

impl Read for StreamGuard<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

struct ClosingGuard<'a>(MutexGuard<'a, Box<dyn CloseRead>>);

impl Read for ClosingGuard<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Drop for ClosingGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.0.close() {
            warn!("failed to close source: {}", e);
        }
    }
}

/// An appended source with its advisory busy flag
#[derive(Debug)]
pub(crate) struct SourceEntry {
    source: Source,
    busy: AtomicBool,
}

impl SourceEntry {
    pub(crate) fn new(source: Source) -> Self {
        Self {
            source,
            busy: AtomicBool::new(false),
        }
    }

    pub(crate) fn source(&self) -> &Source {
        &self.source
    }

    pub(crate) fn lock(&self) {
        self.busy.store(true, Ordering::SeqCst);
    }

    pub(crate) fn unlock(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }

    /// Opens the source, or returns `None` while it is flagged busy
    pub(crate) fn open(&self) -> io::Result<Option<Box<dyn Read + '_>>> {
        if self.busy.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.source.open().map(Some)
    }
}
