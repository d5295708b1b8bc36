use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};

use super::{StoreBackend, StoredRecipe};
use crate::errors::StoreError;

/// Recipe cache persisted to a SQLite file, one JSON-encoded row per slug.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the cache database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS recipe_cache (
                slug TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl StoreBackend for SqliteBackend {
    fn load_all(&self) -> Result<Vec<(String, StoredRecipe)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT slug, record FROM recipe_cache")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (slug, raw) = row?;
            match serde_json::from_str::<StoredRecipe>(&raw) {
                Ok(record) => records.push((slug, record)),
                Err(e) => tracing::warn!(slug = %slug, "Skipping undecodable cached recipe: {}", e),
            }
        }
        Ok(records)
    }

    fn put(&self, slug: &str, record: &StoredRecipe) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(record)?;
        self.conn()?.execute(
            "INSERT INTO recipe_cache (slug, record, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(slug) DO UPDATE SET record = excluded.record, updated_at = datetime('now')",
            params![slug, encoded],
        )?;
        Ok(())
    }

    fn delete(&self, slug: &str) -> Result<(), StoreError> {
        self.conn()?
            .execute("DELETE FROM recipe_cache WHERE slug = ?1", params![slug])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.conn()?.execute("DELETE FROM recipe_cache", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecipePartial;

    fn stored(slug: &str) -> StoredRecipe {
        StoredRecipe {
            partial: Some(RecipePartial {
                slug: slug.to_string(),
                name: slug.to_uppercase(),
                description: Some("d".to_string()),
                tags: vec!["t".to_string()],
                image_url: None,
                prep_time_minutes: Some(5),
                cook_time_minutes: None,
            }),
            full: None,
        }
    }

    #[test]
    fn test_put_then_load() -> Result<(), StoreError> {
        let backend = SqliteBackend::open_in_memory()?;
        backend.put("a", &stored("a"))?;
        backend.put("a", &stored("a"))?;
        backend.put("b", &stored("b"))?;

        let mut loaded = backend.load_all()?;
        loaded.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].1, stored("a"));
        Ok(())
    }

    #[test]
    fn test_delete_and_clear() -> Result<(), StoreError> {
        let backend = SqliteBackend::open_in_memory()?;
        backend.put("a", &stored("a"))?;
        backend.put("b", &stored("b"))?;

        backend.delete("a")?;
        assert_eq!(backend.load_all()?.len(), 1);

        backend.clear()?;
        assert!(backend.load_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_undecodable_rows_are_skipped() -> Result<(), StoreError> {
        let backend = SqliteBackend::open_in_memory()?;
        backend.put("good", &stored("good"))?;
        backend.conn()?.execute(
            "INSERT INTO recipe_cache (slug, record) VALUES ('bad', '{not json')",
            [],
        )?;

        let loaded = backend.load_all()?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "good");
        Ok(())
    }
}
