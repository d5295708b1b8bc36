use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Favorite recipe slugs kept as a JSON array in a local file.
#[derive(Debug, Clone)]
pub struct Favorites {
    path: PathBuf,
}

impl Favorites {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All favorites in insertion order. A missing or malformed file reads as
    /// empty.
    pub fn all(&self) -> Vec<String> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed favorites file {}: {}", self.path.display(), e);
            Vec::new()
        })
    }

    pub fn is_favorite(&self, slug: &str) -> bool {
        self.all().iter().any(|s| s == slug)
    }

    /// Flip the favorite status of `slug` and persist. Returns the new status.
    pub fn toggle(&self, slug: &str) -> Result<bool> {
        let mut favorites = self.all();
        let now_favorite = match favorites.iter().position(|s| s == slug) {
            Some(index) => {
                favorites.remove(index);
                false
            }
            None => {
                favorites.push(slug.to_string());
                true
            }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create favorites directory")?;
        }
        let encoded = serde_json::to_string(&favorites).context("Failed to encode favorites")?;
        std::fs::write(&self.path, encoded)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(now_favorite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let favorites = Favorites::new(dir.path().join("state").join("favorites.json"));

        assert!(favorites.all().is_empty());
        assert!(favorites.toggle("stew")?);
        assert!(favorites.toggle("pie")?);
        assert!(favorites.is_favorite("stew"));
        assert_eq!(favorites.all(), vec!["stew", "pie"]);

        assert!(!favorites.toggle("stew")?);
        assert!(!favorites.is_favorite("stew"));
        assert_eq!(favorites.all(), vec!["pie"]);
        Ok(())
    }

    #[test]
    fn test_malformed_file_reads_as_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("favorites.json");
        std::fs::write(&path, "{\"not\": \"a list\"}")?;

        let favorites = Favorites::new(&path);
        assert!(favorites.all().is_empty());
        assert!(favorites.toggle("stew")?);
        assert_eq!(favorites.all(), vec!["stew"]);
        Ok(())
    }
}
