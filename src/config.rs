use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::sync::SyncTiming;

pub const DEFAULT_STORAGE_BUCKET: &str = "recipe-images";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_CACHE_PATH: &str = ".recipe-feed/cache.db";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
    pub storage_bucket: String,
}

/// Runtime configuration, resolved once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendSettings,
    /// Shared secret accepted in place of a user session by mutating routes.
    pub edit_token: Option<String>,
    pub gemini_api_key: Option<String>,
    pub api_base_url: String,
    pub sync_timing: SyncTiming,
    pub cache_path: PathBuf,
    pub verbose: bool,
}

impl Config {
    /// Load `.env.local` then `.env` from `dir`. Variables already set in the
    /// process are never overridden, so the process environment wins, then
    /// `.env.local`, then `.env`.
    pub fn load_env_files(dir: &Path) {
        for name in [".env.local", ".env"] {
            let path = dir.join(name);
            if path.exists() {
                match dotenvy::from_path(&path) {
                    Ok(()) => tracing::debug!("Loaded environment from {}", path.display()),
                    Err(e) => tracing::warn!("Failed to load {}: {}", path.display(), e),
                }
            }
        }
    }

    /// Build the configuration from the process environment.
    pub fn from_env(verbose: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), verbose)
    }

    /// Build the configuration from an arbitrary variable lookup. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F, verbose: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend = BackendSettings {
            url: get("NEXT_PUBLIC_SUPABASE_URL").or_else(|| get("SUPABASE_URL")),
            anon_key: get("NEXT_PUBLIC_SUPABASE_ANON_KEY"),
            service_role_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            storage_bucket: get("RECIPE_STORAGE_BUCKET")
                .unwrap_or_else(|| DEFAULT_STORAGE_BUCKET.to_string()),
        };

        let defaults = SyncTiming::default();
        let sync_timing = SyncTiming {
            debounce: parse_millis("RECIPE_SYNC_DEBOUNCE_MS", get("RECIPE_SYNC_DEBOUNCE_MS"))?
                .unwrap_or(defaults.debounce),
            guard: parse_millis("RECIPE_SYNC_GUARD_MS", get("RECIPE_SYNC_GUARD_MS"))?
                .unwrap_or(defaults.guard),
        };

        Ok(Self {
            backend,
            edit_token: get("EDIT_TOKEN"),
            gemini_api_key: get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            api_base_url: get("NEXT_PUBLIC_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            sync_timing,
            cache_path: get("RECIPE_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH)),
            verbose,
        })
    }

    /// Favorites live next to the recipe cache.
    pub fn favorites_path(&self) -> PathBuf {
        self.cache_path.with_file_name("favorites.json")
    }

    pub fn require_edit_token(&self) -> Result<&str, ConfigError> {
        self.edit_token
            .as_deref()
            .ok_or(ConfigError::Missing { name: "EDIT_TOKEN" })
    }
}

fn parse_millis(name: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Invalid {
                    name,
                    message: format!("expected milliseconds, got {:?} ({})", raw, e),
                })
        })
        .transpose()
}
