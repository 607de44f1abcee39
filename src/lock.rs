//! Pluggable locking around the registry
//!
//! A [`Manager`](crate::Manager) never creates its own lock; it receives one
//! implementing [`RegistryLock`] at construction. Mutations go through
//! [`RegistryLock::write`], reads through [`RegistryLock::read`].

use std::sync::{Mutex, PoisonError, RwLock};

use crate::registry::Registry;

/// Exclusive and shared access to a [`Registry`]
///
/// Implementations must not call back into the owning manager from inside
/// the closures.
pub trait RegistryLock: Send + Sync {
    /// Runs `f` with shared access
    fn read<T>(&self, f: impl FnOnce(&Registry) -> T) -> T;

    /// Runs `f` with exclusive access
    fn write<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T;
}

/// Readers share the lock; writers are exclusive
impl RegistryLock for RwLock<Registry> {
    fn read<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        let guard = RwLock::read(self).unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let mut guard = RwLock::write(self).unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// Every access is exclusive
impl RegistryLock for Mutex<Registry> {
    fn read<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        let guard = self.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let mut guard = self.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
