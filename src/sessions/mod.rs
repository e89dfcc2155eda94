//! Sleep sessions — the record type, the storage contract, and the store
//! backends.

pub mod in_memory;
pub mod json_file;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use json_file::JsonFileSessionStore;
pub use traits::{SessionStore, SleepSession};

use crate::config::Config;
use anyhow::{bail, Result};

/// Factory: create the session store backend selected by config.
pub fn create_session_store(config: &Config) -> Result<Box<dyn SessionStore>> {
    match config.store.backend.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(Box::new(JsonFileSessionStore::new(
            config.store.session_file_path(&config.workspace_dir),
        ))),
        "memory" => Ok(Box::new(InMemorySessionStore::new())),
        other => bail!("unknown session store backend: {other}"),
    }
}
