pub mod memory;
pub mod postgres;
pub mod snapshot_codec;

use sentinel_core::{SentinelError, Snapshot, StateStore};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

pub const STORE_STATE: &str = "state";
pub const STORE_ARTIFACTS: &str = "artifacts";
pub const STORE_DEAD_LETTER: &str = "dead-letter";
pub const STORE_HISTORY: &str = "history";

/// Encodes and writes a `Snapshot` into `store`'s `state` namespace under
/// `key`.
pub async fn put_snapshot(
    store: &dyn StateStore,
    key: &str,
    snapshot: &Snapshot,
) -> Result<(), SentinelError> {
    let bytes = snapshot_codec::encode_snapshot(snapshot)?;
    store
        .put(STORE_STATE, key, &bytes, Some("application/json"))
        .await
}

pub async fn get_snapshot(
    store: &dyn StateStore,
    key: &str,
) -> Result<Option<Snapshot>, SentinelError> {
    match store.get(STORE_STATE, key).await? {
        Some(bytes) => Ok(Some(snapshot_codec::decode_snapshot(&bytes)?)),
        None => Ok(None),
    }
}
