//! Add command handler.

use anyhow::Result;

use bulkdl_core::{BatchManagerPort, ItemId};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Queue URLs without downloading them.
///
/// The selections stay in the incoming buffer until a `run` process merges
/// them. Selections are keyed by URL, so queueing a URL already in the batch
/// is a no-op unless `again` asks for a freshly generated id.
pub async fn execute(
    ctx: &CliContext,
    urls: &[String],
    title: Option<&str>,
    again: bool,
) -> Result<()> {
    let mut selections = super::selections(urls, title);
    if again {
        for selection in &mut selections {
            selection.id = ItemId::generate();
        }
    }
    let count = selections.len();

    ctx.manager()
        .enqueue(selections)
        .await
        .map_err(CliError::from)?;

    println!("Queued {count} item(s). Start downloading with 'bulkdl run'.");
    Ok(())
}
