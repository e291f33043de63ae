//! Last committed table and view definitions.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::schema::{Table, View};

/// Process-local cache keyed by fully qualified name.
///
/// Entries are only written after the statements that produced them
/// succeeded. Readers always get clones.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Table>>,
    views: RwLock<HashMap<String, View>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the cached table.
    #[must_use]
    pub fn table(&self, key: &str) -> Option<Table> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores or replaces a table.
    pub fn put_table(&self, key: impl Into<String>, table: Table) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), table);
    }

    /// Removes a table.
    pub fn remove_table(&self, key: &str) -> Option<Table> {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Applies `mutate` to the cached entry under the write lock, so
    /// concurrent commits on the same table compose. Returns the updated
    /// table, or `None` if the entry is gone.
    pub fn update_table<F>(&self, key: &str, mutate: F) -> Option<Table>
    where
        F: FnOnce(&mut Table),
    {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.get_mut(key)?;
        mutate(table);
        Some(table.clone())
    }

    /// Returns a copy of the cached view.
    #[must_use]
    pub fn view(&self, key: &str) -> Option<View> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores or replaces a view.
    pub fn put_view(&self, key: impl Into<String>, view: View) {
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), view);
    }

    /// Removes a view.
    pub fn remove_view(&self, key: &str) -> Option<View> {
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Drops every entry whose key lives in `namespace`, or everything.
    pub fn clear(&self, namespace: Option<&str>) {
        let keep = |key: &String| match namespace {
            Some(ns) => !key.starts_with(&format!("{ns}.")),
            None => false,
        };
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| keep(key));
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| keep(key));
    }

    /// Number of cached tables.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    #[test]
    fn test_put_and_read_back_copies() {
        let cache = SchemaCache::new();
        cache.put_table("public.users", Table::new("public.users"));

        let mut copy = cache.table("public.users").unwrap();
        copy.columns.push(Column::new("id", "integer"));
        assert!(cache.table("public.users").unwrap().columns.is_empty());
    }

    #[test]
    fn test_update_composes() {
        let cache = SchemaCache::new();
        cache.put_table("t", Table::new("t"));
        cache.update_table("t", |t| t.columns.push(Column::new("a", "int")));
        let updated = cache
            .update_table("t", |t| t.columns.push(Column::new("b", "int")))
            .unwrap();
        assert_eq!(updated.columns.len(), 2);
        assert!(cache.update_table("missing", |_| {}).is_none());
    }

    #[test]
    fn test_clear_namespace() {
        let cache = SchemaCache::new();
        cache.put_table("a.t", Table::new("a.t"));
        cache.put_table("b.t", Table::new("b.t"));
        cache.put_view("a.v", View::new("a.v", "SELECT 1"));
        cache.clear(Some("a"));
        assert!(cache.table("a.t").is_none());
        assert!(cache.view("a.v").is_none());
        assert_eq!(cache.table_count(), 1);
        cache.clear(None);
        assert_eq!(cache.table_count(), 0);
    }
}
