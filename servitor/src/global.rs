//! Process-wide default locator, for hosts wanting the classic
//! one-registry-per-process pattern at the application entry point.
//!
//! The explicit [ServiceLocator] object remains the primary interface - tests
//! in particular should construct their own locator per case. The global is a
//! lazily-created instance behind a mutex, which serializes registration,
//! resolution and reset across threads.

use crate::error::LocatorError;
use crate::locator::ServiceLocator;
use std::sync::{Mutex, OnceLock, PoisonError};

static GLOBAL: OnceLock<Mutex<ServiceLocator>> = OnceLock::new();

fn global() -> &'static Mutex<ServiceLocator> {
    GLOBAL.get_or_init(|| Mutex::new(ServiceLocator::new()))
}

/// Runs the given closure against the process-wide locator. Access is
/// serialized, so the closure must not call back into this module.
pub fn with_locator<R>(f: impl FnOnce(&mut ServiceLocator) -> R) -> R {
    let mut locator = global().lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut locator)
}

/// Resets the process-wide locator. The global handle is swapped for a fresh
/// instance first and the detached one is disposed afterwards, so no disposer
/// runs while the lock is held.
///
/// On disposal failure the detached locator - still holding the undisposed
/// bindings - is reinstalled as the global, replacing anything registered in
/// the meantime, so the reset can be retried.
pub async fn reset() -> Result<(), LocatorError> {
    let mut detached = {
        let mut locator = global().lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *locator)
    };

    let result = detached.reset().await;
    if result.is_err() {
        let mut locator = global().lock().unwrap_or_else(PoisonError::into_inner);
        *locator = detached;
    }

    result
}
