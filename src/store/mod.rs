use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::models::ProductRecord;

/// product_id → record, in the store's natural (file) order.
pub type Inventory = IndexMap<String, ProductRecord>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("inventory file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("inventory file {path} is not valid JSON: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whole-inventory persistence. `save` replaces the stored state wholesale.
pub trait InventoryStore: Send + Sync {
    /// Returns an empty inventory when nothing has been persisted yet.
    fn load(&self) -> Result<Inventory, StoreError>;
    fn save(&self, inventory: &Inventory) -> Result<(), StoreError>;
}

// ── JSON file ─────────────────────────────────────────────────────────────────

/// Inventory kept in a single human-readable JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn serde_err(&self, source: serde_json::Error) -> StoreError {
        StoreError::Serde {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "inventory.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl InventoryStore for JsonFileStore {
    fn load(&self) -> Result<Inventory, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No inventory file yet, starting empty");
                return Ok(Inventory::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };

        if contents.trim().is_empty() {
            return Ok(Inventory::new());
        }

        serde_json::from_str(&contents).map_err(|e| self.serde_err(e))
    }

    fn save(&self, inventory: &Inventory) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        inventory
            .serialize(&mut ser)
            .map_err(|e| self.serde_err(e))?;
        buf.push(b'\n');

        // Write beside the target and rename so readers never see a partial file.
        let tmp = self.temp_path();
        let mut file = fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
        file.write_all(&buf).map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;

        debug!(path = %self.path.display(), products = inventory.len(), "Saved inventory");
        Ok(())
    }
}
