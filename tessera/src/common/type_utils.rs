use std::sync::Arc;

use parking_lot::RwLock;

pub type Atomic<T> = Arc<RwLock<T>>;

#[inline]
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

/// Logs a store statement when query tracing is enabled.
#[inline]
pub(crate) fn print_query(show_query: bool, statement: &str) {
    if show_query {
        log::info!("{}", statement);
    }
}
