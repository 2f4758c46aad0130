//! Run command handler.

use std::time::Duration;

use anyhow::Result;

use bulkdl_core::BatchManagerPort;
use bulkdl_core::items::any_active;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::BatchProgress;

const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Download the batch until it drains or the user interrupts.
///
/// Recovers whatever a previous process left behind, queues `urls`, then
/// redraws progress from the stored collection.
pub async fn execute(ctx: &CliContext, urls: &[String]) -> Result<()> {
    let manager = ctx.manager();

    let reset = manager.recover().await.map_err(CliError::from)?;
    if reset > 0 {
        tracing::info!(target: "bulkdl.cli", reset, "Resuming previous batch");
    }

    if urls.is_empty() {
        manager.request_tick();
    } else {
        manager
            .enqueue(super::selections(urls, None))
            .await
            .map_err(CliError::from)?;
    }

    let progress = BatchProgress::new();
    let mut refresh = tokio::time::interval(REFRESH_INTERVAL);
    let interrupted = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break true,
            _ = refresh.tick() => {
                let items = manager.items().await.map_err(CliError::from)?;
                progress.update(&items);
                if !manager.is_ticking() && !any_active(&items) {
                    break false;
                }
            }
        }
    };

    manager.shutdown().await;
    let items = manager.items().await.map_err(CliError::from)?;
    progress.finish(&progress.update(&items));

    if interrupted {
        println!("Interrupted. Run 'bulkdl run' again to continue.");
    } else {
        println!("Files are in {}", ctx.download_dir().display());
    }
    Ok(())
}
