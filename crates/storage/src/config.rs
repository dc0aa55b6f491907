use std::env;

/// Environment variable holding the SQLite URL.
pub const DB_URL_ENV: &str = "KAKOMON_DB_URL";
/// Environment variable selecting the backend (`sqlite` or `memory`).
pub const BACKEND_ENV: &str = "KAKOMON_STORAGE";
pub const DEFAULT_DB_URL: &str = "sqlite://kakomon.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite { url: String },
    Memory,
}

/// Where durable documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::sqlite(DEFAULT_DB_URL)
    }
}

impl StorageConfig {
    #[must_use]
    pub fn sqlite(url: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Sqlite { url: url.into() },
        }
    }

    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
        }
    }

    /// Read `KAKOMON_STORAGE` / `KAKOMON_DB_URL`, falling back to the default SQLite file.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var(BACKEND_ENV).ok().as_deref(),
            env::var(DB_URL_ENV).ok().as_deref(),
        )
    }

    fn from_vars(backend: Option<&str>, url: Option<&str>) -> Self {
        if backend.is_some_and(|b| b.eq_ignore_ascii_case("memory")) {
            return Self::memory();
        }
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Self::sqlite(url),
            None => Self::default(),
        }
    }
}
