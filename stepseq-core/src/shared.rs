//! interrupt-safe cell for state shared between the step interrupt and
//! foreground code

use core::cell::RefCell;
use critical_section::Mutex;

/// Each `with` runs inside a critical section, so multi-byte updates (tempo
/// reload, several note edits) are seen whole by the interrupt. Calling
/// `with` again from inside the closure panics.
pub struct Shared<T> {
    inner: Mutex<RefCell<Option<T>>>,
}

impl<T> Shared<T> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// install `value`, returning any previous occupant
    pub fn init(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(value))
    }

    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// `None` until initialized
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}
