//! Neighbor context and prompt rendering.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::processing::types::{CellType, SemanticCell};

const NO_CONTEXT: &str = "(none)";

/// Context for bottom-up runs: each child's content followed by the summaries attached to it.
/// Summary cells directly under the node are reported as child summaries too.
///
/// Reaching one level down for each child's own `Summary` cells is an intentional extension:
/// summaries hang under the cell they summarize, so a parent would otherwise never see them.
pub(crate) fn from_children(cell: &SemanticCell) -> String {
    let mut parts = Vec::new();
    for child in &cell.children {
        let content = child.content();
        if child.cell_type == CellType::Summary {
            parts.push(format!("Child summary: {content}"));
            continue;
        }
        if !content.is_empty() {
            parts.push(format!("Child content: {content}"));
        }
        parts.extend(
            child
                .children
                .iter()
                .filter(|grandchild| grandchild.cell_type == CellType::Summary)
                .map(|summary| format!("Child summary: {}", summary.content())),
        );
    }
    join_parts(parts)
}

/// Context for top-down runs: the parent's content followed by the parent's summaries.
pub(crate) fn from_parent(parent: Option<&SemanticCell>) -> String {
    let Some(parent) = parent else {
        return NO_CONTEXT.to_string();
    };

    let mut parts = Vec::new();
    let content = parent.content();
    if !content.is_empty() {
        parts.push(format!("Parent content: {content}"));
    }
    parts.extend(
        parent
            .children
            .iter()
            .filter(|child| child.cell_type == CellType::Summary)
            .map(|summary| format!("Parent summary: {}", summary.content())),
    );
    join_parts(parts)
}

fn join_parts(parts: Vec<String>) -> String {
    if parts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        parts.join("\n\n")
    }
}

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{(tokens|content|context)\}").expect("placeholder pattern compiles")
    })
}

/// Substitute `{tokens}`, `{content}` and `{context}` in a single pass, so placeholder-like
/// text inside the content is left alone.
pub(crate) fn render_prompt(template: &str, tokens: usize, content: &str, context: &str) -> String {
    placeholder()
        .replace_all(template, |captures: &Captures<'_>| match &captures[1] {
            "tokens" => tokens.to_string(),
            "content" => content.to_string(),
            _ => context.to_string(),
        })
        .into_owned()
}
