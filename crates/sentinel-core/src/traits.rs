use async_trait::async_trait;

use crate::config::TargetSpec;
use crate::error::SentinelError;
use crate::types::Snapshot;

/// Backend-agnostic fetch interface. Implemented by the static
/// `reqwest` backend and the rendered `headless_chrome` backend in
/// `sentinel-fetch`, and by an in-memory fake in pipeline tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `target`, given the previous snapshot (if any) to support
    /// conditional requests. Returns a normalized `Snapshot` — normalization
    /// happens inside the fetcher so that `mode` can depend on the
    /// response's content type, which only the fetcher observes directly.
    async fn fetch(
        &self,
        target: &TargetSpec,
        previous: Option<&Snapshot>,
    ) -> Result<Snapshot, SentinelError>;
}

/// A named, semantic key-value store: `state`, `artifacts`,
/// `dead-letter`, `history`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, store: &str, key: &str) -> Result<Option<Vec<u8>>, SentinelError>;
    async fn put(
        &self,
        store: &str,
        key: &str,
        value: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), SentinelError>;
    async fn list(
        &self,
        store: &str,
        limit: usize,
        offset: usize,
        desc: bool,
    ) -> Result<Vec<(String, Vec<u8>)>, SentinelError>;
    async fn delete(&self, store: &str, key: &str) -> Result<(), SentinelError>;
}
