//! Loading orchestration and section/key accessors
//!
//! A [`Manager`] owns the options, the registry (behind an injected
//! [`RegistryLock`]) and the list of appended data sources. Accessors hand out
//! lightweight [`SectionRef`] / [`KeyRef`] handles that look their target up
//! again on every call, so they never hold the lock between calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{IniError, Result, ValueError};
use crate::lock::RegistryLock;
use crate::options::Options;
use crate::parser::parse_reader;
use crate::registry::{DEFAULT_SECTION, Key, Registry, Section};
use crate::source::{Source, SourceEntry};
use crate::transform::{TransformContext, resolve_value};
use crate::value::{FromValue, parse_time_format, split_list};

#[derive(Default)]
struct SourceQueue {
    loaded: Vec<Arc<SourceEntry>>,
    pending: Vec<Arc<SourceEntry>>,
}

/// Flags sources busy for its lifetime
struct BusyGuard(Vec<Arc<SourceEntry>>);

impl BusyGuard {
    fn lock(entries: Vec<Arc<SourceEntry>>) -> Self {
        for entry in &entries {
            entry.lock();
        }
        Self(entries)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        for entry in &self.0 {
            entry.unlock();
        }
    }
}

/// Clears the batch flag even if the batch closure panics
struct BatchGuard<'a>(&'a AtomicBool);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Configuration loaded from one or more data sources
pub struct Manager<L: RegistryLock = RwLock<Registry>> {
    options: Options,
    registry: L,
    sources: Mutex<SourceQueue>,
    batch: AtomicBool,
}

impl Manager {
    /// Creates an empty manager guarded by an `RwLock`
    pub fn new(options: Options) -> Self {
        Self::with_lock(options, RwLock::new(Registry::new()))
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl<L: RegistryLock> Manager<L> {
    /// Creates an empty manager guarded by `lock`
    ///
    /// Any content already in the locked registry is discarded.
    pub fn with_lock(options: Options, lock: L) -> Self {
        lock.write(Registry::clear);
        Self {
            options: options.normalized(),
            registry: lock,
            sources: Mutex::new(SourceQueue::default()),
            batch: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn queue(&self) -> MutexGuard<'_, SourceQueue> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a source and loads it, unless a batch is in progress
    pub fn append(&self, source: impl Into<Source>) -> Result<()> {
        self.queue()
            .pending
            .push(Arc::new(SourceEntry::new(source.into())));
        if self.batch.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.flush()
    }

    /// Queues several sources and loads them with a single flush
    pub fn append_all<I, S>(&self, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        self.batch(|manager| {
            for source in sources {
                manager.append(source)?;
            }
            Ok(())
        })
    }

    /// Runs `f` with loading deferred, then loads everything it appended
    ///
    /// Nested batches only run `f`; the outermost batch does the loading.
    pub fn batch<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        if self.batch.swap(true, Ordering::SeqCst) {
            return f(self);
        }

        let result = {
            let _batch = BatchGuard(&self.batch);
            f(self)
        };
        debug!("batch finished, flushing");
        self.flush()?;
        result
    }

    /// Loads every pending source, in append order
    ///
    /// Loaded sources are flagged busy meanwhile. A source that fails to
    /// parse is dropped and its error returned; sources after it stay pending.
    pub fn flush(&self) -> Result<()> {
        let mut queue = self.queue();
        let _busy = BusyGuard::lock(queue.loaded.clone());

        while !queue.pending.is_empty() {
            let entry = queue.pending.remove(0);
            self.registry
                .write(|registry| self.load_entry(&entry, registry))?;
            queue.loaded.push(entry);
        }
        Ok(())
    }

    /// Reparses every loaded source into a fresh registry and swaps it in
    ///
    /// Sections and keys created programmatically are discarded. On error
    /// the current content is kept.
    pub fn reload(&self) -> Result<()> {
        let queue = self.queue();
        debug!(sources = queue.loaded.len(), "reloading");

        let mut fresh = Registry::new();
        for entry in &queue.loaded {
            self.load_entry(entry, &mut fresh)?;
        }
        self.registry.write(|registry| *registry = fresh);
        Ok(())
    }

    fn load_entry(&self, entry: &SourceEntry, registry: &mut Registry) -> Result<()> {
        let reader = match entry.open() {
            Ok(Some(reader)) => reader,
            // The queue lock already serializes flush and reload; the flag
            // keeps any other opener of a flagged entry from reading it
            Ok(None) => {
                debug!("skipping busy source {:?}", entry.source());
                return Ok(());
            }
            Err(e)
                if self.options.loose
                    && entry.source().is_path()
                    && e.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!("loose mode, missing source {:?}", entry.source());
                registry.new_section(DEFAULT_SECTION);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        debug!("loading {:?}", entry.source());
        parse_reader(reader, &self.options, registry)
    }

    /// Returns the section, creating it if needed
    pub fn new_section(&self, name: &str) -> SectionRef<'_, L> {
        let section = self.section(name);
        self.registry.write(|registry| {
            registry.new_section(&section.name);
        });
        section
    }

    /// Handle on a section that may or may not exist yet
    pub fn section(&self, name: &str) -> SectionRef<'_, L> {
        SectionRef {
            manager: self,
            name: self.options.section_name(name).into_owned(),
        }
    }

    /// Handle on an existing section
    pub fn get_section(&self, name: &str) -> Result<SectionRef<'_, L>> {
        let section = self.section(name);
        if section.exists() {
            Ok(section)
        } else {
            Err(IniError::SectionNotFound {
                name: name.to_string(),
            })
        }
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).exists()
    }

    pub fn section_names(&self) -> Vec<String> {
        self.registry.read(Registry::section_names)
    }

    pub fn sections(&self) -> Vec<SectionRef<'_, L>> {
        self.section_names()
            .into_iter()
            .map(|name| SectionRef {
                manager: self,
                name,
            })
            .collect()
    }

    /// Copy of the raw registry
    pub fn snapshot(&self) -> Registry {
        self.registry.read(Registry::clone)
    }

    /// All resolved values, by section and key, in declaration order
    pub fn to_map(&self) -> IndexMap<String, IndexMap<String, String>> {
        self.registry.read(|registry| {
            registry
                .sections()
                .map(|section| {
                    let keys: IndexMap<String, String> = section
                        .keys()
                        .map(|key| {
                            let ctx = TransformContext::new(registry, &self.options, section, key);
                            (key.name().to_string(), ctx.resolve())
                        })
                        .collect();
                    (section.name().to_string(), keys)
                })
                .collect()
        })
    }
}

/// Handle on a named section
pub struct SectionRef<'m, L: RegistryLock = RwLock<Registry>> {
    manager: &'m Manager<L>,
    name: String,
}

impl<'m, L: RegistryLock> SectionRef<'m, L> {
    /// Name after case folding
    pub fn name(&self) -> &str {
        &self.name
    }

    fn read<T>(&self, f: impl FnOnce(&Section) -> T) -> Option<T> {
        self.manager
            .registry
            .read(|registry| registry.section(&self.name).map(f))
    }

    pub fn exists(&self) -> bool {
        self.read(|_| ()).is_some()
    }

    pub fn comment(&self) -> String {
        self.read(|section| section.comment.clone())
            .unwrap_or_default()
    }

    pub fn set_comment(&self, comment: impl Into<String>) {
        let comment = comment.into();
        self.manager.registry.write(|registry| {
            if let Some(section) = registry.section_mut(&self.name) {
                section.comment = comment;
            }
        });
    }

    /// Nearest existing section whose name is a prefix of this one, cut at
    /// the child delimiter
    pub fn parent(&self) -> Option<SectionRef<'m, L>> {
        let delimiter = self.manager.options.child_section_delimiter.as_str();
        let mut name = self.name.as_str();
        while let Some(i) = name.rfind(delimiter) {
            name = &name[..i];
            let parent = SectionRef {
                manager: self.manager,
                name: name.to_string(),
            };
            if parent.exists() {
                return Some(parent);
            }
        }
        None
    }

    /// Handle on a key of this section, or of a parent section
    pub fn key(&self, name: &str) -> KeyRef<'m, L> {
        KeyRef {
            manager: self.manager,
            section: self.name.clone(),
            name: self.manager.options.key_name(name).into_owned(),
        }
    }

    /// Handle on a key that exists in this section or a parent section
    pub fn get_key(&self, name: &str) -> Result<KeyRef<'m, L>> {
        let key = self.key(name);
        if key.exists() {
            Ok(key)
        } else {
            Err(IniError::KeyNotFound {
                section: self.name.clone(),
                key: name.to_string(),
            })
        }
    }

    /// Returns true if this section itself declares the key
    pub fn has_key(&self, name: &str) -> bool {
        let name = self.manager.options.key_name(name);
        self.read(|section| section.key(&name).is_some())
            .unwrap_or(false)
    }

    /// Returns true if any key of this section holds the raw value
    pub fn has_value(&self, value: &str) -> bool {
        self.read(|section| section.has_value(value))
            .unwrap_or(false)
    }

    pub fn key_names(&self) -> Vec<String> {
        self.read(Section::key_names).unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<KeyRef<'m, L>> {
        self.key_names()
            .into_iter()
            .map(|name| KeyRef {
                manager: self.manager,
                section: self.name.clone(),
                name,
            })
            .collect()
    }

    /// Resolved values of this section's own keys
    pub fn key_values(&self) -> IndexMap<String, String> {
        let manager = self.manager;
        manager.registry.read(|registry| {
            registry
                .section(&self.name)
                .map(|section| {
                    section
                        .keys()
                        .map(|key| {
                            let ctx = TransformContext::new(registry, &manager.options, section, key);
                            (key.name().to_string(), ctx.resolve())
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// Creates the key unless it exists; an existing key keeps its value
    pub fn new_key(&self, name: &str, value: impl Into<String>) -> KeyRef<'m, L> {
        let key = self.key(name);
        let value = value.into();
        self.manager.registry.write(|registry| {
            registry.new_section(&self.name).new_key(&key.name, value);
        });
        key
    }

    /// Creates a boolean key with the value `"true"`
    pub fn new_boolean_key(&self, name: &str) -> KeyRef<'m, L> {
        let key = self.key(name);
        self.manager.registry.write(|registry| {
            registry.new_section(&self.name).new_boolean_key(&key.name);
        });
        key
    }

    /// Resolved value of a key, empty when it does not exist
    pub fn string(&self, key: &str) -> String {
        self.key(key).string()
    }

    pub fn parse<T: FromValue>(&self, key: &str) -> Result<T, ValueError> {
        self.key(key).parse()
    }

    pub fn must<T: FromValue>(&self, key: &str, default: T) -> T {
        self.key(key).must(default)
    }
}

/// Handle on a key
///
/// The key is searched in its section first, then in parent sections.
pub struct KeyRef<'m, L: RegistryLock = RwLock<Registry>> {
    manager: &'m Manager<L>,
    section: String,
    name: String,
}

impl<L: RegistryLock> KeyRef<'_, L> {
    /// Name after case folding
    pub fn name(&self) -> &str {
        &self.name
    }

    fn read<T>(&self, f: impl FnOnce(&Section, &Key) -> T) -> Option<T> {
        let delimiter = self.manager.options.child_section_delimiter.as_str();
        self.manager.registry.read(|registry| {
            registry
                .find_key(&self.section, &self.name, delimiter)
                .map(|(section, key)| f(section, key))
        })
    }

    pub fn exists(&self) -> bool {
        self.read(|_, _| ()).is_some()
    }

    /// Raw value as parsed, empty when the key does not exist
    pub fn value(&self) -> String {
        self.read(|_, key| key.value().to_string())
            .unwrap_or_default()
    }

    /// Value after transformation and substitution
    pub fn string(&self) -> String {
        let options = &self.manager.options;
        self.manager
            .registry
            .read(|registry| resolve_value(registry, options, &self.section, &self.name))
            .unwrap_or_default()
    }

    pub fn comment(&self) -> String {
        self.read(|_, key| key.comment.clone()).unwrap_or_default()
    }

    pub fn is_boolean(&self) -> bool {
        self.read(|_, key| key.boolean).unwrap_or(false)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.read(|_, key| key.auto_increment).unwrap_or(false)
    }

    /// Replaces the raw value; does nothing if the key does not exist
    pub fn set_value(&self, value: impl Into<String>) {
        let Some(owner) = self.read(|section, _| section.name().to_string()) else {
            return;
        };
        let value = value.into();
        self.manager.registry.write(|registry| {
            if let Some(key) = registry
                .section_mut(&owner)
                .and_then(|section| section.key_mut(&self.name))
            {
                key.set_value(value);
            }
        });
    }

    /// Passes the resolved value through `f`
    pub fn validate(&self, f: impl FnOnce(&str) -> String) -> String {
        f(&self.string())
    }

    pub fn parse<T: FromValue>(&self) -> Result<T, ValueError> {
        T::from_value(&self.string())
    }

    /// Parses the value, or stores and returns `default` when it is invalid
    pub fn must<T: FromValue>(&self, default: T) -> T {
        match self.parse() {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %self.name, "using default: {}", e);
                self.set_value(default.to_value());
                default
            }
        }
    }

    /// Returns the value, or stores and returns `default` when it is empty
    pub fn must_string(&self, default: &str) -> String {
        let value = self.string();
        if value.is_empty() && !default.is_empty() {
            self.set_value(default);
            return default.to_string();
        }
        value
    }

    /// Returns the value if it is one of `candidates`, otherwise `default`
    pub fn in_candidates<T: FromValue + PartialEq>(&self, default: T, candidates: &[T]) -> T {
        match self.parse::<T>() {
            Ok(value) if candidates.contains(&value) => value,
            _ => default,
        }
    }

    /// Returns the value if it lies within `min..=max`, otherwise `default`
    pub fn range<T: FromValue + PartialOrd>(&self, default: T, min: T, max: T) -> T {
        match self.parse::<T>() {
            Ok(value) if value >= min && value <= max => value,
            _ => default,
        }
    }

    /// Splits the value on `delim`, see [`split_list`]
    pub fn strings(&self, delim: &str) -> Vec<String> {
        split_list(&self.string(), delim)
    }

    /// Parses each element; invalid elements become `T::default()`
    pub fn list<T: FromValue + Default>(&self, delim: &str) -> Vec<T> {
        self.strings(delim)
            .iter()
            .map(|item| T::from_value(item).unwrap_or_default())
            .collect()
    }

    /// Parses each element; invalid elements are dropped
    pub fn valid_list<T: FromValue>(&self, delim: &str) -> Vec<T> {
        self.strings(delim)
            .iter()
            .filter_map(|item| T::from_value(item).ok())
            .collect()
    }

    /// Parses each element, failing on the first invalid one
    pub fn strict_list<T: FromValue>(&self, delim: &str) -> Result<Vec<T>, ValueError> {
        self.strings(delim)
            .iter()
            .map(|item| T::from_value(item))
            .collect()
    }

    pub fn duration(&self) -> Result<Duration, ValueError> {
        self.parse()
    }

    /// Parses an RFC 3339 timestamp
    pub fn time(&self) -> Result<DateTime<FixedOffset>, ValueError> {
        self.parse()
    }

    /// Parses a timestamp with a chrono format string
    pub fn time_format(&self, format: &str) -> Result<DateTime<FixedOffset>, ValueError> {
        parse_time_format(&self.string(), format)
    }
}
