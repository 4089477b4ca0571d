//! The host environment's global execution lock.
//!
//! A scripting host runs its code under one process-wide lock (an interpreter
//! lock). Host tasks hold it while they run; the binding layer releases it
//! around calls that block in the driver and takes it again before handing
//! control back. Threads the host does not own, such as the driver's
//! interrupt thread, must take it before calling into host code.

use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

static EXECUTION_LOCK: ExecutionLock = ExecutionLock::new();

/// Returns the process-wide execution lock.
pub fn global() -> &'static ExecutionLock {
    &EXECUTION_LOCK
}

/// Acquires the process-wide execution lock for the current thread.
pub fn acquire() -> HostGuard<'static> {
    EXECUTION_LOCK.acquire()
}

/// A lock owned by at most one thread at a time, reentrant for its owner.
pub struct ExecutionLock {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl ExecutionLock {
    /// Creates an unheld lock.
    pub const fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the calling thread holds the lock.
    pub fn is_held(&self) -> bool {
        *self.state() == Some(thread::current().id())
    }

    /// Blocks until the calling thread owns the lock.
    ///
    /// If the caller already owns it the returned guard is a no-op, so nested
    /// acquisition never deadlocks.
    pub fn acquire(&self) -> HostGuard<'_> {
        let owned = self.take();
        HostGuard {
            lock: self,
            owned,
            _not_send: PhantomData,
        }
    }

    /// Returns `false` when the caller already held the lock.
    fn take(&self) -> bool {
        let me = thread::current().id();
        let mut owner = self.state();
        if *owner == Some(me) {
            return false;
        }
        while owner.is_some() {
            owner = self
                .released
                .wait(owner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *owner = Some(me);
        true
    }

    fn release(&self) {
        *self.state() = None;
        self.released.notify_one();
    }

    /// Runs `f` with the lock released so other host tasks can make progress.
    ///
    /// The lock is taken again before returning, also when `f` panics. Callers
    /// that do not hold the lock just run `f`.
    pub fn allow_threads<T>(&self, f: impl FnOnce() -> T) -> T {
        if !self.is_held() {
            return f();
        }
        log::trace!("host::allow_threads releasing execution lock");
        self.release();
        let _reacquire = Reacquire(self);
        f()
    }

    /// Runs `f` while holding the lock, taking it first if the caller does not
    /// already own it. Used by threads the host did not start.
    pub fn ensure<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.acquire();
        f()
    }
}

impl Default for ExecutionLock {
    fn default() -> Self {
        Self::new()
    }
}

struct Reacquire<'a>(&'a ExecutionLock);

impl Drop for Reacquire<'_> {
    fn drop(&mut self) {
        self.0.take();
        log::trace!("host::allow_threads reacquired execution lock");
    }
}

/// Ownership of the execution lock, released on drop.
///
/// The guard is tied to the thread that acquired it and is not `Send`.
pub struct HostGuard<'a> {
    lock: &'a ExecutionLock,
    owned: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for HostGuard<'_> {
    fn drop(&mut self) {
        if self.owned {
            self.lock.release();
        }
    }
}
