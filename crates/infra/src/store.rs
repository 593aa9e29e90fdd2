use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;

/// Key/value store for the operational records around the ledger
/// (batches, return lines, RTO orders, repacking items, sessions).
pub trait KeyedStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Result<Option<V>, StoreError>;
    fn upsert(&self, key: K, value: V) -> Result<(), StoreError>;
    fn list(&self) -> Result<Vec<V>, StoreError>;

    /// Mutate one record in place under the write lock.
    ///
    /// Returns `None` when the key is absent.
    fn modify<R, F>(&self, key: &K, f: F) -> Result<Option<R>, StoreError>
    where
        F: FnOnce(&mut V) -> R;
}

impl<K, V, S> KeyedStore<K, V> for Arc<S>
where
    S: KeyedStore<K, V>,
{
    fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) -> Result<(), StoreError> {
        (**self).upsert(key, value)
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        (**self).list()
    }

    fn modify<R, F>(&self, key: &K, f: F) -> Result<Option<R>, StoreError>
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).modify(key, f)
    }
}

/// In-memory store for tests/dev and for the non-ledger records.
#[derive(Debug)]
pub struct InMemoryKeyedStore<K, V> {
    name: &'static str,
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryKeyedStore<K, V> {
    /// `name` only shows up in lock-poisoning errors.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> KeyedStore<K, V> for InMemoryKeyedStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned(self.name))?;
        Ok(map.get(key).cloned())
    }

    fn upsert(&self, key: K, value: V) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned(self.name))?;
        map.insert(key, value);
        Ok(())
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned(self.name))?;
        Ok(map.values().cloned().collect())
    }

    fn modify<R, F>(&self, key: &K, f: F) -> Result<Option<R>, StoreError>
    where
        F: FnOnce(&mut V) -> R,
    {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned(self.name))?;
        Ok(map.get_mut(key).map(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modify_reports_missing_keys() {
        let store: InMemoryKeyedStore<u32, i64> = InMemoryKeyedStore::new("test");
        store.upsert(1, 10).unwrap();

        assert_eq!(store.modify(&1, |v| { *v += 5; *v }).unwrap(), Some(15));
        assert_eq!(store.modify(&2, |v| *v).unwrap(), None);
        assert_eq!(store.get(&1).unwrap(), Some(15));
    }

    #[test]
    fn arc_store_delegates() {
        let store = Arc::new(InMemoryKeyedStore::<u32, &'static str>::new("test"));
        store.upsert(7, "seven").unwrap();
        assert_eq!(store.list().unwrap(), vec!["seven"]);
    }
}
