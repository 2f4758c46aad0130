//! Startup recovery.

use bulkdl_core::{BatchError, ItemId};

use super::BatchManager;

impl BatchManager {
    /// Bring a collection persisted by a previous process back to a
    /// schedulable state.
    ///
    /// Transitional states are reset. Transfers the backend no longer knows
    /// are forgotten so the items are dispatched again; transfers it does
    /// know are observed once, which catches completions that happened while
    /// nothing was listening. Returns the number of items reset.
    pub async fn recover(&self) -> Result<usize, BatchError> {
        let mut reset = self.store.update(|batch| batch.reset_transitional()).await?;

        let transfers = self.store.load().await?.transfers();
        let mut lost: Vec<ItemId> = Vec::new();
        for (id, backend_id) in transfers {
            match self.backend.query(backend_id).await {
                Ok(snapshot) => self.apply_snapshot(backend_id, snapshot).await,
                Err(e) => {
                    tracing::debug!(
                        target: "bulkdl.scheduler",
                        %id,
                        %backend_id,
                        error = %e,
                        "Transfer lost across restart"
                    );
                    lost.push(id);
                }
            }
        }

        if !lost.is_empty() {
            reset += self.store.update(|batch| batch.reset_transfers(&lost)).await?;
        }

        if reset > 0 {
            tracing::info!(target: "bulkdl.scheduler", reset, "Recovered batch");
        }
        Ok(reset)
    }
}
