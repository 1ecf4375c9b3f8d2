//! Save and restore a memory store as a single JSON document
//!
//! The document is `{"eventRecords": [...], "lastSequenceNumber": n}`.

use std::path::Path;

use tracing::{info, instrument};

use crate::error::{StoreError, StoreResult};
use crate::utils::atomic_write;

use super::store::{MemoryEventStore, MemoryEventStoreConfig};
use super::stream::EventStream;

impl MemoryEventStore {
    /// Write every committed record to `path`, replacing it atomically
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let (content, records) = {
            let stream = self.stream.read().await;
            (serde_json::to_vec_pretty(&*stream)?, stream.len())
        };

        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || atomic_write(&path, &content))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

        info!(records, "saved event log");
        Ok(())
    }

    /// Restore a store previously written by [`save_to_file`](Self::save_to_file).
    ///
    /// The restored store starts with no subscribers.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load_from_file<P: AsRef<Path>>(
        path: P,
        config: MemoryEventStoreConfig,
    ) -> StoreResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let stream: EventStream = serde_json::from_str(&content)?;
        let (records, last_sequence_number) = stream.into_parts();
        let stream = EventStream::from_parts(records, last_sequence_number)?;

        info!(
            records = stream.len(),
            last_sequence_number = stream.last_sequence_number(),
            "loaded event log"
        );
        Ok(Self::from_stream(stream, config))
    }
}
