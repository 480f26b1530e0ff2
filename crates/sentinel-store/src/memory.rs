use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sentinel_core::{SentinelError, StateStore};

struct Entry {
    value: Vec<u8>,
    content_type: Option<String>,
    updated_at: DateTime<Utc>,
}

/// In-memory `DashMap`-backed fake for pipeline tests — a real second
/// `StateStore` implementation, not a trait-object stub.
#[derive(Default)]
pub struct MemoryStore {
    data: DashMap<(String, String), Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, store: &str, key: &str) -> Result<Option<Vec<u8>>, SentinelError> {
        Ok(self
            .data
            .get(&(store.to_string(), key.to_string()))
            .map(|e| e.value.clone()))
    }

    async fn put(
        &self,
        store: &str,
        key: &str,
        value: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), SentinelError> {
        self.data.insert(
            (store.to_string(), key.to_string()),
            Entry {
                value: value.to_vec(),
                content_type: content_type.map(|s| s.to_string()),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(
        &self,
        store: &str,
        limit: usize,
        offset: usize,
        desc: bool,
    ) -> Result<Vec<(String, Vec<u8>)>, SentinelError> {
        let mut matching: Vec<(String, Vec<u8>, DateTime<Utc>)> = self
            .data
            .iter()
            .filter(|e| e.key().0 == store)
            .map(|e| (e.key().1.clone(), e.value().value.clone(), e.value().updated_at))
            .collect();

        matching.sort_by(|a, b| if desc { b.2.cmp(&a.2) } else { a.2.cmp(&b.2) });

        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(k, v, _)| (k, v))
            .collect())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<(), SentinelError> {
        self.data.remove(&(store.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        store.put("state", "k1", b"hello", None).await.unwrap();
        let got = store.get("state", "k1").await.unwrap();
        assert_eq!(got, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn stores_are_isolated_by_name() {
        let store = MemoryStore::new();
        store.put("state", "k1", b"a", None).await.unwrap();
        store.put("artifacts", "k1", b"b", None).await.unwrap();
        assert_eq!(store.get("state", "k1").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(
            store.get("artifacts", "k1").await.unwrap(),
            Some(b"b".to_vec())
        );
    }

    #[tokio::test]
    async fn list_respects_limit_offset_and_order() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .put("history", &format!("k{i}"), format!("v{i}").as_bytes(), None)
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        let page = store.list("history", 2, 1, true).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].0, "k3");
        assert_eq!(page[1].0, "k2");
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = MemoryStore::new();
        store.put("state", "k1", b"a", None).await.unwrap();
        store.delete("state", "k1").await.unwrap();
        assert_eq!(store.get("state", "k1").await.unwrap(), None);
    }
}
