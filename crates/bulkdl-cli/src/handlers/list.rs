//! List command handler.

use anyhow::Result;

use bulkdl_core::{BatchItem, BatchManagerPort};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{format_progress, print_separator, truncate_string};

/// Print every item of the batch.
///
/// Group children are indented under their group.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let items = ctx.manager().items().await.map_err(CliError::from)?;

    if items.is_empty() {
        println!("The batch is empty.");
        println!("Use 'bulkdl add <url>' to queue downloads.");
        return Ok(());
    }

    println!("{:<10} {:<8} {:<40} ID", "Status", "Progress", "Title");
    print_separator(100);

    for item in &items {
        if item.as_single().is_some_and(|s| s.parent_id.is_some()) {
            continue;
        }
        print_row(item, "");

        if let Some(group) = item.as_multiple() {
            for child in &group.children {
                if let Some(child) = items.iter().find(|i| i.id() == child) {
                    print_row(child, "  ");
                }
            }
        }
    }

    Ok(())
}

fn print_row(item: &BatchItem, indent: &str) {
    let title = truncate_string(&format!("{indent}{}", item.title()), 40);
    println!(
        "{:<10} {:<8} {:<40} {}",
        item.status_label(),
        format_progress(item.progress()),
        title,
        item.id()
    );

    let error = match item {
        BatchItem::Pending(p) => p.error.as_deref(),
        BatchItem::Single(s) => s.error.as_deref(),
        BatchItem::Multiple(_) => None,
    };
    if let Some(error) = error {
        println!("{:<19} {indent}error: {error}", "");
    }
}
