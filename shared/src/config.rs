use std::env;

/// Which gateways back the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Aws,
    Memory,
}

/// Deployment-specific names, read once at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub users_table: String,
    pub papers_table: String,
    pub bucket: String,
    pub backend: StorageBackend,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let backend = match lookup("STORAGE_BACKEND").as_deref() {
            Some("memory") => StorageBackend::Memory,
            Some("aws") | None => StorageBackend::Aws,
            Some(other) => {
                tracing::warn!("Unknown STORAGE_BACKEND {:?}, falling back to aws", other);
                StorageBackend::Aws
            }
        };

        Self {
            users_table: lookup("USERS_TABLE").unwrap_or_else(|| "qpaper-users".to_string()),
            papers_table: lookup("PAPERS_TABLE").unwrap_or_else(|| "qpaper-papers".to_string()),
            bucket: lookup("PAPERS_BUCKET").unwrap_or_else(|| "qpaper-papers".to_string()),
            backend,
        }
    }
}
