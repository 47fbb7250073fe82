//! One-way transition from a locked building state to a lock-free frozen one.

use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// State that is mutable under a private lock until frozen, then published
/// for lock-free reads.
///
/// Freezing moves the state out of the lock into the `OnceLock`; nothing is
/// shared between the two forms. Publication through the `OnceLock` is what
/// makes the frozen state visible to every thread that reads it afterwards.
pub(crate) struct Lifecycle<T> {
    building: Mutex<Option<T>>,
    frozen: OnceLock<T>,
}

impl<T: Default> Default for Lifecycle<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Lifecycle<T> {
    pub(crate) fn new(state: T) -> Self {
        Self {
            building: Mutex::new(Some(state)),
            frozen: OnceLock::new(),
        }
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }

    /// Mutate the building state, failing with [`Error::Frozen`] once frozen.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut guard = self.building.lock();
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(Error::Frozen),
        }
    }

    /// Read the state, locking only while still building.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if let Some(state) = self.frozen.get() {
            return f(state);
        }
        let guard = self.building.lock();
        match (guard.as_ref(), self.frozen.get()) {
            (Some(state), _) => f(state),
            (None, Some(state)) => f(state),
            // The builder is only taken while the lock is held, and the
            // frozen slot is filled before the lock is released.
            (None, None) => unreachable!("building state taken without being frozen"),
        }
    }

    /// Freeze the state, running `seal` on it first. Returns false when the
    /// state was already frozen, in which case `seal` is not called.
    pub(crate) fn freeze(&self, seal: impl FnOnce(&mut T)) -> bool {
        let mut guard = self.building.lock();
        let Some(mut state) = guard.take() else {
            return false;
        };
        seal(&mut state);
        if self.frozen.set(state).is_err() {
            unreachable!("frozen twice");
        }
        true
    }
}
