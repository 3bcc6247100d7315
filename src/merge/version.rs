//! Version token replacement in merged trees.

use super::conflict::{ConflictAction, ConflictEvent};
use crate::fieldpath::Path;
use crate::rules::VersionUpdate;
use crate::value::Value;
use tracing::{debug, warn};

/// Returns the text of a version field. YAML reads `version: 2.1` as a
/// number, so numeric scalars count as their written form.
pub fn version_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        // Debug keeps the fraction of whole floats: 2.0 stays "2.0".
        Value::Float(x) if x.is_finite() => Some(format!("{:?}", x)),
        _ => None,
    }
}

/// Replaces `from` with `to` inside every version field the update matches.
///
/// Only the token is replaced; the text around it is kept. Fields that do
/// not contain the token are left alone, and numeric fields are rewritten as
/// strings. Sequences are searched too, so patterns may address
/// `images[0]`-style paths.
pub fn replace_version_tokens(
    tree: &mut Value,
    update: &VersionUpdate,
    from: &str,
    to: &str,
    reference: &Value,
) -> Vec<ConflictEvent> {
    if from.is_empty() || from == to {
        return Vec::new();
    }

    let hits: Vec<(Path, String)> = tree
        .walk_all()
        .filter(|(path, _)| update.matches(path))
        .filter_map(|(path, node)| {
            let text = version_text(node)?;
            text.contains(from).then_some((path, text))
        })
        .collect();

    let mut events = Vec::with_capacity(hits.len());
    for (path, old) in hits {
        let new = old.replace(from, to);
        if let Err(err) = tree.set_in_place(&path, Value::String(new.clone())) {
            warn!(path = %path, error = %err, "version field could not be rewritten");
            continue;
        }
        debug!(path = %path, from, to, "version token replaced");
        events.push(
            ConflictEvent::new(
                path.clone(),
                ConflictAction::Overwrite,
                format!("version {} updated to {}", from, to),
            )
            .source_value(Some(&Value::String(old)))
            .target_value(Some(&Value::String(new)))
            .reference_default(reference.get_path(&path)),
        );
    }
    events
}
