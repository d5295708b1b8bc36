//! Read-through recipe cache.
//!
//! `RecipeStore` keeps at most one partial and one full record per slug in
//! memory and mirrors every write to a [`StoreBackend`]. Backend failures are
//! logged and swallowed so the in-memory cache always keeps working.

pub mod sqlite;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::models::{RecipeFull, RecipePartial};

pub use sqlite::SqliteBackend;

/// Everything cached for one slug. This is the unit the backend persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecipe {
    #[serde(default)]
    pub partial: Option<RecipePartial>,
    #[serde(default)]
    pub full: Option<RecipeFull>,
}

/// Durable backing for the cache.
pub trait StoreBackend: Send {
    fn load_all(&self) -> Result<Vec<(String, StoredRecipe)>, StoreError>;
    fn put(&self, slug: &str, record: &StoredRecipe) -> Result<(), StoreError>;
    fn delete(&self, slug: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local backing. Clones share the same map, so a second store opened
/// over a clone sees what the first one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<Mutex<HashMap<String, StoredRecipe>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn load_all(&self) -> Result<Vec<(String, StoredRecipe)>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records
            .iter()
            .map(|(slug, record)| (slug.clone(), record.clone()))
            .collect())
    }

    fn put(&self, slug: &str, record: &StoredRecipe) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        records.insert(slug.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, slug: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        records.remove(slug);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        records.clear();
        Ok(())
    }
}

pub struct RecipeStore {
    partials: HashMap<String, RecipePartial>,
    fulls: HashMap<String, RecipeFull>,
    backend: Box<dyn StoreBackend>,
}

impl RecipeStore {
    /// Open a store over `backend`, restoring everything it holds.
    pub fn open(backend: impl StoreBackend + 'static) -> Self {
        let mut store = Self {
            partials: HashMap::new(),
            fulls: HashMap::new(),
            backend: Box::new(backend),
        };

        match store.backend.load_all() {
            Ok(records) => {
                for (slug, record) in records {
                    if let Some(partial) = record.partial {
                        store.partials.insert(slug.clone(), partial);
                    }
                    if let Some(full) = record.full {
                        store.fulls.insert(slug, full);
                    }
                }
                tracing::debug!(
                    partials = store.partials.len(),
                    fulls = store.fulls.len(),
                    "Restored recipe cache"
                );
            }
            Err(e) => tracing::warn!("Failed to restore recipe cache: {}", e),
        }

        store
    }

    /// A store with no persistence.
    pub fn in_memory() -> Self {
        Self::open(MemoryBackend::new())
    }

    /// Open a store persisted to a SQLite file at `path`.
    pub fn open_sqlite(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::open(SqliteBackend::open(path)?))
    }

    pub fn get_partial(&self, slug: &str) -> Option<RecipePartial> {
        self.partials.get(slug).cloned()
    }

    pub fn has_partial(&self, slug: &str) -> bool {
        self.partials.contains_key(slug)
    }

    pub fn get_all_partials(&self) -> Vec<RecipePartial> {
        self.partials.values().cloned().collect()
    }

    /// Overwrite the partial record for its slug. An existing full record is
    /// kept.
    pub fn set_partial(&mut self, record: RecipePartial) {
        let slug = record.slug.clone();
        self.partials.insert(slug.clone(), record);
        self.persist(&slug);
    }

    pub fn set_partials(&mut self, records: impl IntoIterator<Item = RecipePartial>) {
        for record in records {
            self.set_partial(record);
        }
    }

    pub fn get_full(&self, slug: &str) -> Option<RecipeFull> {
        self.fulls.get(slug).cloned()
    }

    pub fn has_full(&self, slug: &str) -> bool {
        self.fulls.contains_key(slug)
    }

    /// Overwrite the full record for its slug. When no partial exists yet one
    /// is derived from the full record so list views can show it.
    pub fn set_full(&mut self, record: RecipeFull) {
        let slug = record.slug.clone();
        if !self.partials.contains_key(&slug) {
            self.partials.insert(slug.clone(), partial_from_full(&record));
        }
        self.fulls.insert(slug.clone(), record);
        self.persist(&slug);
    }

    pub fn remove(&mut self, slug: &str) {
        self.partials.remove(slug);
        self.fulls.remove(slug);
        if let Err(e) = self.backend.delete(slug) {
            tracing::warn!(slug, "Failed to remove cached recipe: {}", e);
        }
    }

    pub fn clear(&mut self) {
        self.partials.clear();
        self.fulls.clear();
        if let Err(e) = self.backend.clear() {
            tracing::warn!("Failed to clear recipe cache: {}", e);
        }
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty() && self.fulls.is_empty()
    }

    fn persist(&self, slug: &str) {
        let record = StoredRecipe {
            partial: self.partials.get(slug).cloned(),
            full: self.fulls.get(slug).cloned(),
        };
        if let Err(e) = self.backend.put(slug, &record) {
            tracing::warn!(slug, "Failed to persist cached recipe: {}", e);
        }
    }
}

fn partial_from_full(full: &RecipeFull) -> RecipePartial {
    RecipePartial {
        slug: full.slug.clone(),
        name: full.name.clone(),
        description: (!full.description.is_empty()).then(|| full.description.clone()),
        tags: full.tags.clone(),
        image_url: full.image_url.clone(),
        prep_time_minutes: full.prep_time_minutes,
        cook_time_minutes: full.cook_time_minutes,
    }
}
