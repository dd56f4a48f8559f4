//! Request-scoped key/value bag.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

/// Values handlers attach to a single [`super::Context`].
///
/// Entries are keyed by name and stored type-erased; lookups downcast back to
/// the concrete type and return `None` on a type mismatch.
///
/// # Examples
///
/// ```
/// use eventwire::context::Values;
///
/// let mut values = Values::default();
/// values.insert("user", String::from("ada"));
/// assert_eq!(values.get::<String>("user").as_deref().map(String::as_str), Some("ada"));
/// assert!(values.get::<u32>("user").is_none());
/// ```
#[derive(Clone, Default)]
pub struct Values {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Values {
    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.entries.insert(
            key.into(),
            Arc::new(value) as Arc<dyn Any + Send + Sync>,
        );
    }

    /// Fetch the value under `key` if it has type `T`.
    #[must_use]
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.entries
            .get(key)
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }

    /// Remove the entry under `key`, returning whether one existed.
    pub fn remove(&mut self, key: &str) -> bool { self.entries.remove(key).is_some() }

    /// Returns `true` if an entry exists under `key`, whatever its type.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool { self.entries.contains_key(key) }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
