mod document;
mod store;

pub use document::{MemoryDocument, MemoryMedia, OverlaySnapshot};
pub use store::MemoryStore;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Guarded data is plain values; poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
