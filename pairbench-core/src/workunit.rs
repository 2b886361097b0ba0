//! Work Units
//!
//! A work unit is one named, parameterless operation against the backing
//! store. The same unit is invoked many times, from many threads at once, so
//! the operation is `Fn + Send + Sync` and owns nothing mutable except what
//! it reaches through the store.

use crate::error::OpError;
use std::fmt;
use std::sync::Arc;

type Operation = dyn Fn() -> Result<(), OpError> + Send + Sync;

/// A named, repeatable store operation. Cloning shares the operation.
#[derive(Clone)]
pub struct WorkUnit {
    name: Arc<str>,
    operation: Arc<Operation>,
}

impl WorkUnit {
    /// Wrap an operation.
    pub fn new<F>(name: impl Into<Arc<str>>, operation: F) -> Self
    where
        F: Fn() -> Result<(), OpError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            operation: Arc::new(operation),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the operation once.
    #[inline]
    pub fn invoke(&self) -> Result<(), OpError> {
        (self.operation)()
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_clones_share_operation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let unit = WorkUnit::new("count", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
        let copy = unit.clone();
        unit.invoke().unwrap();
        copy.invoke().unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(copy.name(), "count");
    }
}
