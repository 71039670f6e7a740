//! Named, type-erased values
//!
//! Backs server decorations, request decorations and plugin exposures. Values
//! are stored behind `Any` and read back by type; a lookup with the wrong type
//! behaves like a missing name.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

pub(crate) type Value = Arc<dyn Any + Send + Sync>;

/// Which host object a decoration is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Server,
    Request,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Server => f.write_str("Server"),
            Surface::Request => f.write_str("Request"),
        }
    }
}

#[derive(Default)]
pub struct NamedValues {
    values: RwLock<HashMap<String, Value>>,
}

impl NamedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Insert a value unless the name is taken. Returns whether it was inserted.
    pub fn define<T: Send + Sync + 'static>(&self, name: &str, value: T) -> bool {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        if values.contains_key(name) {
            return false;
        }
        values.insert(name.to_string(), Arc::new(value));
        true
    }

    /// Insert or replace a value.
    pub fn set<T: Send + Sync + 'static>(&self, name: &str, value: T) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), Arc::new(value));
    }

    /// Hold the write lock, for updates that must see and change the whole map at once.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Read a value back as `T`.
    pub fn get<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(name)?.downcast_ref::<T>().cloned()
    }

    /// All names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

impl fmt::Debug for NamedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedValues")
            .field("names", &self.names())
            .finish()
    }
}
