use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::client::{DriveItem, GraphClient, GraphError};

/// What a retention pass did. `halted` carries the error of a failed
/// deletion, which stops the pass but is never escalated by it.
#[derive(Debug)]
pub struct RetentionReport {
    pub total: usize,
    pub deleted: Vec<DriveItem>,
    pub halted: Option<GraphError>,
}

/// Bounds the target folder to `max_items` by deleting the oldest item
/// until the count fits. Only the initial listing can fail the call;
/// everything past it is best-effort.
pub async fn enforce_retention(
    client: &GraphClient,
    max_items: usize,
) -> Result<RetentionReport, GraphError> {
    let mut items = client.list_children().await?;
    let total = items.len();
    tracing::debug!(total, max_items, "listed the target folder for retention");

    let mut deleted = Vec::new();
    let mut halted = None;
    while items.len() > max_items {
        let Some(index) = oldest_index(&items) else {
            tracing::warn!(
                excess = items.len() - max_items,
                "no remaining item has a parseable creation timestamp, leaving excess items in place"
            );
            break;
        };
        let item = items[index].clone();
        tracing::info!(
            name = %item.name,
            created = item.created.as_deref().unwrap_or_default(),
            "deleting the oldest backup"
        );
        match client.delete_item(&item.id).await {
            Ok(()) => {
                items.remove(index);
                deleted.push(item);
            }
            Err(err) => {
                tracing::warn!(name = %item.name, error = %err, "failed to delete the oldest backup, stopping the retention pass");
                halted = Some(err);
                break;
            }
        }
    }

    Ok(RetentionReport {
        total,
        deleted,
        halted,
    })
}

// Index of the oldest item by creation timestamp; the first minimum
// encountered wins ties. Items whose timestamp does not parse are never
// candidates but still count toward the folder total.
fn oldest_index(items: &[DriveItem]) -> Option<usize> {
    let mut oldest: Option<(usize, OffsetDateTime)> = None;
    for (index, item) in items.iter().enumerate() {
        let Some(raw) = item.created.as_deref() else {
            tracing::error!(name = %item.name, "item has no creation timestamp");
            continue;
        };
        match OffsetDateTime::parse(raw, &Rfc3339) {
            Ok(created) => {
                if oldest.is_none_or(|(_, minimum)| created < minimum) {
                    oldest = Some((index, created));
                }
            }
            Err(_) => {
                tracing::error!(timestamp = raw, "unable to parse the creation timestamp");
            }
        }
    }
    oldest.map(|(index, _)| index)
}
