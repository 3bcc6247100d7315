//! Explicit path migrations applied to site trees before merging.

use super::conflict::{ConflictAction, ConflictEvent};
use crate::fieldpath::Path;
use crate::value::Value;
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Relocates values according to `migrations`, old path to new path.
///
/// Entries are applied in order, so chained entries move a value along the
/// chain. Mappings emptied by a move are pruned. A move whose destination
/// cannot be created is skipped and the value stays where it was.
pub fn apply_migrations(
    tree: &Value,
    migrations: &IndexMap<Path, Path>,
    source_id: &str,
) -> (Value, Vec<ConflictEvent>) {
    let mut current = tree.clone();
    let mut events = Vec::new();

    for (old, new) in migrations {
        let (mut moved, value) = match current.without_path(old) {
            Ok((next, Some(value))) => (next, value),
            Ok((_, None)) | Err(_) => continue,
        };
        moved.prune_empty_parents(old, |_| false);
        if let Err(err) = moved.set_in_place(new, value.clone()) {
            warn!(from = %old, to = %new, error = %err, "migration skipped");
            continue;
        }
        debug!(from = %old, to = %new, source = source_id, "migrated");
        events.push(
            ConflictEvent::new(
                new.clone(),
                ConflictAction::Migrated,
                format!("moved from {} in source '{}'", old, source_id),
            )
            .source_value(Some(&value))
            .target_value(Some(&value)),
        );
        current = moved;
    }
    (current, events)
}
