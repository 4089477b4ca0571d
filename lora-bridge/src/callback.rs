//! Bridge from the driver's packet-received notification to a host callback.
//!
//! The driver only accepts a plain function pointer, so the registered
//! callback lives in a process-wide slot and a fixed trampoline,
//! [`packet_received`], is what the driver actually calls.

use core::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::host;

/// A zero-argument host callable.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

static SLOT: Mutex<CriticalSectionRawMutex, RefCell<Option<Callback>>> =
    Mutex::new(RefCell::new(None));

/// Replaces the registered callback and returns the previous one.
///
/// The previous callback is handed back instead of dropped in place so its
/// destructor never runs inside the critical section.
pub(crate) fn install(callback: Option<Callback>) -> Option<Callback> {
    SLOT.lock(|slot| slot.replace(callback))
}

/// Returns a new reference to the registered callback, if any.
pub fn current() -> Option<Callback> {
    SLOT.lock(|slot| slot.borrow().clone())
}

/// Whether a callback is registered.
pub fn is_registered() -> bool {
    SLOT.lock(|slot| slot.borrow().is_some())
}

/// Clears the slot if it still holds `callback`.
///
/// A callback installed by someone else in the meantime is left in place.
pub fn release(callback: &Callback) {
    let previous = SLOT.lock(|slot| {
        let mut slot = slot.borrow_mut();
        match slot.as_ref() {
            Some(current) if ptr::addr_eq(Arc::as_ptr(current), Arc::as_ptr(callback)) => {
                slot.take()
            }
            _ => None,
        }
    });
    if previous.is_some() {
        log::debug!("lora::release receive callback released");
    }
}

/// Trampoline handed to the driver.
///
/// May run on a thread the host does not own. The slot is read only once the
/// execution lock is held, so a callback unregistered while this thread was
/// waiting for the lock is never called. The callback is cloned out of the
/// slot and stays alive for the whole call even if the registration is
/// replaced or cleared meanwhile.
pub extern "C" fn packet_received() {
    if !is_registered() {
        return;
    }
    host::global().ensure(|| {
        let Some(callback) = current() else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            log::error!("lora::packet_received receive callback panicked");
        }
    });
}

/// Serializes tests that touch the process-wide slot.
#[cfg(test)]
pub(crate) fn serial() -> std::sync::MutexGuard<'static, ()> {
    static SERIAL: std::sync::Mutex<()> = std::sync::Mutex::new(());
    SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = hits.clone();
        let callback: Callback = Arc::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (hits, callback)
    }

    #[test]
    fn trampoline_without_callback_is_a_no_op() {
        let _serial = serial();
        drop(install(None));
        packet_received();
        assert!(!is_registered());
    }

    #[test]
    fn trampoline_calls_registered_callback_once() {
        let _serial = serial();
        let (hits, callback) = counter();
        drop(install(Some(callback)));
        thread::spawn(|| packet_received()).join().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        drop(install(None));
        thread::spawn(|| packet_received()).join().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn install_hands_back_previous() {
        let _serial = serial();
        let (first_hits, first) = counter();
        let (_, second) = counter();
        assert!(install(Some(first)).is_none());
        // The test and the installed closure each own the counter.
        assert_eq!(Arc::strong_count(&first_hits), 2);
        let previous = install(Some(second));
        assert!(previous.is_some());
        drop(previous);
        assert_eq!(Arc::strong_count(&first_hits), 1);
        drop(install(None));
    }

    #[test]
    fn panicking_callback_does_not_unwind_into_the_driver() {
        let _serial = serial();
        drop(install(Some(Arc::new(|| panic!("callback failed")))));
        thread::spawn(|| packet_received()).join().unwrap();
        drop(install(None));
    }

    #[test]
    fn callback_waits_for_the_execution_lock() {
        let _serial = serial();
        let (hits, callback) = counter();
        drop(install(Some(callback)));
        let guard = host::acquire();
        let irq = thread::spawn(|| packet_received());
        thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        drop(guard);
        irq.join().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        drop(install(None));
    }

    #[test]
    fn callback_cleared_while_waiting_for_the_lock_is_skipped() {
        let _serial = serial();
        let (hits, callback) = counter();
        drop(install(Some(callback)));
        let guard = host::acquire();
        let irq = thread::spawn(|| packet_received());
        thread::sleep(std::time::Duration::from_millis(50));
        drop(install(None));
        drop(guard);
        irq.join().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn release_only_clears_its_own_callback() {
        let _serial = serial();
        let (first_hits, first) = counter();
        let (_, second) = counter();
        drop(install(Some(second.clone())));

        release(&first);
        assert!(current().is_some_and(|cb| Arc::ptr_eq(&cb, &second)));

        release(&second);
        assert!(!is_registered());
        drop(first);
        assert_eq!(Arc::strong_count(&first_hits), 1);
    }
}
