//! Handlers for the commands that only edit the batch.

use anyhow::Result;

use bulkdl_core::{BatchManagerPort, ItemId};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Retry one failed item, or every failed item.
pub async fn retry(ctx: &CliContext, id: Option<&str>) -> Result<()> {
    match id {
        Some(id) => {
            ctx.manager()
                .retry(&ItemId::new(id))
                .await
                .map_err(CliError::from)?;
            println!("Queued '{id}' for retry.");
        }
        None => {
            ctx.manager()
                .retry_all_failed()
                .await
                .map_err(CliError::from)?;
            println!("Queued every failed item for retry.");
        }
    }
    Ok(())
}

pub async fn pause(ctx: &CliContext) -> Result<()> {
    ctx.manager().pause_all().await.map_err(CliError::from)?;
    println!("Paused running downloads.");
    Ok(())
}

pub async fn resume(ctx: &CliContext) -> Result<()> {
    ctx.manager().resume_all().await.map_err(CliError::from)?;
    println!("Resumed paused downloads.");
    Ok(())
}

pub async fn remove(ctx: &CliContext, id: &str) -> Result<()> {
    ctx.manager()
        .remove(&ItemId::new(id))
        .await
        .map_err(CliError::from)?;
    println!("Removed '{id}'.");
    Ok(())
}

pub async fn clear(ctx: &CliContext) -> Result<()> {
    ctx.manager().clear_all().await.map_err(CliError::from)?;
    println!("Cleared the batch.");
    Ok(())
}

pub async fn clear_completed(ctx: &CliContext) -> Result<()> {
    ctx.manager()
        .clear_completed()
        .await
        .map_err(CliError::from)?;
    println!("Removed completed items.");
    Ok(())
}

/// Reveal an item's file.
///
/// Transfers belong to the process that started them, so this only finds
/// files of downloads known to this process; otherwise it points at the
/// download directory.
pub async fn open(ctx: &CliContext, id: &str) -> Result<()> {
    ctx.manager()
        .show_in_folder(&ItemId::new(id))
        .await
        .map_err(CliError::from)?;
    println!("Downloads are in {}", ctx.download_dir().display());
    Ok(())
}
