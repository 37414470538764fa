//! Table strategies. Row 0 is always the header.

/// Render header, separator and rows as a markdown table.
pub(crate) fn markdown(header: &[String], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(markdown_row(header));
    lines.push(format!("|{}|", vec!["---"; header.len()].join("|")));
    lines.extend(rows.iter().map(|row| markdown_row(row)));
    lines.join("\n")
}

fn markdown_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

/// Rows joined by newline with cells pipe-delimited; the text fallback for non-table strategies.
pub(crate) fn serialize(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join(" | "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_header(table: &[Vec<String>]) -> Option<(&[String], &[Vec<String>])> {
    match table {
        [header, rows @ ..] if !rows.is_empty() => Some((header.as_slice(), rows)),
        _ => None,
    }
}

/// One chunk per data row, cells space-joined.
pub(crate) fn by_row(table: &[Vec<String>]) -> Vec<String> {
    let Some((_, rows)) = split_header(table) else {
        return Vec::new();
    };
    rows.iter().map(|row| row.join(" ")).collect()
}

/// One markdown table per data row.
pub(crate) fn by_row_with_headers(table: &[Vec<String>]) -> Vec<String> {
    let Some((header, rows)) = split_header(table) else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| markdown(header, std::slice::from_ref(row)))
        .collect()
}

/// One markdown table per `group_size` consecutive data rows.
pub(crate) fn by_row_group(table: &[Vec<String>], group_size: usize) -> Vec<String> {
    let Some((header, rows)) = split_header(table) else {
        return Vec::new();
    };
    rows.chunks(group_size.max(1))
        .map(|group| markdown(header, group))
        .collect()
}

/// One `header: value, ...` line per data row, pairing columns up to the shorter length.
pub(crate) fn by_key_value(table: &[Vec<String>]) -> Vec<String> {
    let Some((header, rows)) = split_header(table) else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            header
                .iter()
                .zip(row)
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()
}

/// The full markdown table as one chunk.
pub(crate) fn whole(table: &[Vec<String>]) -> Vec<String> {
    let Some((header, rows)) = split_header(table) else {
        return Vec::new();
    };
    vec![markdown(header, rows)]
}
