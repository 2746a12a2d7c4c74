use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use cropdoc_core::{ImageRef, NormalizedAdvisory, PersistedAdvisory};

/// Append-only advisory storage.
///
/// There is no update or delete: every successful diagnosis is a new record,
/// even for an image that was diagnosed before.
#[async_trait]
pub trait AdvisoryStore: Send + Sync {
    /// Insert a new advisory for the image and return the stored record.
    async fn save(&self, image: &ImageRef, advisory: NormalizedAdvisory) -> Result<PersistedAdvisory>;

    /// Fetch a stored advisory by ID.
    async fn get(&self, id: Uuid) -> Result<Option<PersistedAdvisory>>;

    /// All advisories recorded for an image reference, newest first.
    async fn list_for_image(&self, image: &str) -> Result<Vec<PersistedAdvisory>>;
}

/// Simple in-memory advisory store for dev/testing.
pub struct InMemoryAdvisoryStore {
    records: RwLock<Vec<PersistedAdvisory>>,
}

impl InMemoryAdvisoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored advisories.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryAdvisoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdvisoryStore for InMemoryAdvisoryStore {
    async fn save(&self, image: &ImageRef, advisory: NormalizedAdvisory) -> Result<PersistedAdvisory> {
        let record = PersistedAdvisory::new(image, advisory);
        self.records
            .write()
            .map_err(|_| anyhow!("advisory store lock poisoned"))?
            .push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PersistedAdvisory>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("advisory store lock poisoned"))?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn list_for_image(&self, image: &str) -> Result<Vec<PersistedAdvisory>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("advisory store lock poisoned"))?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.image == image)
            .cloned()
            .collect())
    }
}
