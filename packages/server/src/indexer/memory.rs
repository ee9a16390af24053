use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use common::search::SearchQuery;
use common::{TrackDocument, TrackId};
use tokio::sync::RwLock;

use super::{SearchError, SearchIndex};

/// In-process index. Holds nothing across restarts; rebuilt at startup.
#[derive(Default)]
pub struct MemoryIndex {
    docs: RwLock<HashMap<TrackId, TrackDocument>>,
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn upsert(&self, doc: &TrackDocument) -> Result<(), SearchError> {
        self.docs.write().await.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn remove(&self, id: TrackId) -> Result<(), SearchError> {
        self.docs.write().await.remove(&id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), SearchError> {
        self.docs.write().await.clear();
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TrackDocument>, SearchError> {
        Ok(query.execute(self.docs.read().await.values()))
    }

    async fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.docs.read().await;
        let titles: BTreeSet<&str> = docs
            .values()
            .map(|d| d.title.as_str())
            .filter(|t| t.to_lowercase().starts_with(&prefix))
            .collect();
        Ok(titles.into_iter().take(limit).map(str::to_owned).collect())
    }
}
