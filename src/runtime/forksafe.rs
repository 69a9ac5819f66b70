// src/runtime/forksafe.rs
//! Process fork notification
//!
//! Components register a [`ForkHook`] once at construction. The first
//! registration installs process-wide `pthread_atfork` handlers which run
//! every live hook around each `fork()`:
//!
//! ```text
//! prepare (parent, before fork)  → before_fork()       reverse registration order
//! parent  (parent, after fork)   → after_fork_parent() registration order
//! child   (child, after fork)    → after_fork_child()  registration order
//! ```
//!
//! The registry lock is taken in the prepare phase and released in both
//! parent and child, so the child never inherits it in a held state.
//!
//! Prepare acquires with `lock_for_fork` so the forking thread never parks.
//! Another thread may still park on a lock held across the fork. The child's
//! `force_unlock` then takes parking_lot's unpark path, which touches the
//! global parking hashtable. That table's bucket locks are word locks held
//! only for a few instructions, so a fork landing inside one is possible but
//! unlikely. Callers that fork while other threads hammer `register` or the
//! writer accept that residual risk.
//!
//! On targets without `fork()` the handlers are never installed;
//! [`simulate_fork`] still drives a hook through the same sequence.

use crate::utils::errors::{Result, TelemetryError};
use once_cell::sync::OnceCell;
use parking_lot::{const_mutex, Mutex};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Callbacks run around a process fork
///
/// Handlers run inside the atfork machinery: they must not block on locks
/// that other threads may hold across the fork, and must not panic.
pub trait ForkHook: Send + Sync {
    /// Called in the parent right before the fork
    fn before_fork(&self) {}

    /// Called in the parent right after the fork
    fn after_fork_parent(&self) {}

    /// Called in the child right after the fork
    fn after_fork_child(&self);
}

static HOOKS: Mutex<Vec<Weak<dyn ForkHook>>> = const_mutex(Vec::new());

/// Return code of the one-time `pthread_atfork` call
static INSTALLED: OnceCell<i32> = OnceCell::new();

/// Register a fork hook for the lifetime of `hook`
///
/// The registry only keeps a weak reference; dropping the last `Arc`
/// unregisters the hook.
pub fn register<H: ForkHook + 'static>(hook: &Arc<H>) -> Result<()> {
    install()?;

    let hook: Arc<dyn ForkHook> = Arc::<H>::clone(hook);
    let mut hooks = HOOKS.lock();
    hooks.retain(|h| h.strong_count() > 0);
    hooks.push(Arc::downgrade(&hook));
    debug!("Registered fork hook ({} live)", hooks.len());
    Ok(())
}

/// Run `hook` as if the current process had just forked and we are the child
pub fn simulate_fork(hook: &dyn ForkHook) {
    hook.before_fork();
    hook.after_fork_child();
}

#[cfg(unix)]
fn install() -> Result<()> {
    let rc = *INSTALLED.get_or_init(|| {
        // SAFETY: the handlers are plain functions with 'static lifetime and
        // only touch statics owned by this module.
        unsafe { libc::pthread_atfork(Some(atfork_prepare), Some(atfork_parent), Some(atfork_child)) }
    });
    if rc == 0 {
        Ok(())
    } else {
        Err(TelemetryError::ForkHandlerInstall(rc))
    }
}

#[cfg(not(unix))]
fn install() -> Result<()> {
    INSTALLED.get_or_init(|| 0);
    Ok(())
}

/// Upgrade the registered hooks without going through the lock
///
/// # Safety
///
/// The caller must be between `atfork_prepare` and one of the post-fork
/// handlers, where the registry lock is held on its behalf.
#[cfg(unix)]
unsafe fn live_hooks() -> Vec<Arc<dyn ForkHook>> {
    (*HOOKS.data_ptr()).iter().filter_map(Weak::upgrade).collect()
}

/// Take `mutex` for the duration of a fork and leak the guard
///
/// Spins on `try_lock` instead of parking, so the forking thread is never
/// queued in the parking hashtable when the fork happens.
pub(crate) fn lock_for_fork<T: ?Sized>(mutex: &Mutex<T>) {
    loop {
        if let Some(guard) = mutex.try_lock() {
            std::mem::forget(guard);
            return;
        }
        std::thread::yield_now();
    }
}

#[cfg(unix)]
unsafe extern "C" fn atfork_prepare() {
    lock_for_fork(&HOOKS);
    for hook in live_hooks().iter().rev() {
        hook.before_fork();
    }
}

#[cfg(unix)]
unsafe extern "C" fn atfork_parent() {
    for hook in live_hooks() {
        hook.after_fork_parent();
    }
    // SAFETY: locked by `atfork_prepare` on this thread.
    HOOKS.force_unlock();
}

#[cfg(unix)]
unsafe extern "C" fn atfork_child() {
    for hook in live_hooks() {
        hook.after_fork_child();
    }
    // SAFETY: locked by `atfork_prepare` in the parent. If a parent thread
    // was parked on the registry, this unlock goes through the unpark path
    // (see the module docs for the residual risk).
    HOOKS.force_unlock();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHook {
        before: AtomicUsize,
        parent: AtomicUsize,
        child: AtomicUsize,
    }

    impl ForkHook for CountingHook {
        fn before_fork(&self) {
            self.before.fetch_add(1, Ordering::SeqCst);
        }

        fn after_fork_parent(&self) {
            self.parent.fetch_add(1, Ordering::SeqCst);
        }

        fn after_fork_child(&self) {
            self.child.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_simulate_fork_runs_prepare_and_child() {
        let hook = CountingHook::default();
        simulate_fork(&hook);

        assert_eq!(hook.before.load(Ordering::SeqCst), 1);
        assert_eq!(hook.parent.load(Ordering::SeqCst), 0);
        assert_eq!(hook.child.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_installs_handlers() {
        let hook = Arc::new(CountingHook::default());
        register(&hook).unwrap();

        assert_eq!(INSTALLED.get().copied(), Some(0));
        assert!(HOOKS.lock().iter().any(|h| h.strong_count() > 0));
    }

    #[test]
    fn test_lock_for_fork_waits_for_holder() {
        let mutex = Arc::new(Mutex::new(0u32));
        let guard = mutex.lock();

        let locker = {
            let mutex = Arc::clone(&mutex);
            std::thread::spawn(move || {
                lock_for_fork(&mutex);
                // SAFETY: locked by `lock_for_fork` above, on this thread.
                unsafe { mutex.force_unlock() };
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(mutex.is_locked());
        drop(guard);
        locker.join().unwrap();

        assert!(!mutex.is_locked());
        assert!(mutex.try_lock().is_some());
    }
}
