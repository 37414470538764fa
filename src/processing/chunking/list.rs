//! List rendering and list strategies.

/// Render list items as numbered (`1. item`) or bulleted (`- item`) lines.
pub(crate) fn serialize(items: &[String], ordered: bool) -> String {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            if ordered {
                format!("{}. {item}", index + 1)
            } else {
                format!("- {item}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The whole rendered list as a single chunk.
pub(crate) fn whole(items: &[String], ordered: bool) -> Vec<String> {
    if items.iter().all(|item| item.trim().is_empty()) {
        return Vec::new();
    }
    vec![serialize(items, ordered)]
}

/// One chunk per non-blank item, unmodified.
pub(crate) fn entries(items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|item| !item.trim().is_empty())
        .cloned()
        .collect()
}
