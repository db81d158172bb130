/// Case-folded form used for both the stored search text and queries.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// Normalized search term, or `None` when there is nothing to search for.
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(normalize(trimmed))
    }
}

/// Searchable fields of one member folded into a single line-separated string.
pub fn search_text<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    fields
        .into_iter()
        .flatten()
        .map(normalize)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substring LIKE pattern for `query`; pair with `ESCAPE '\'`.
pub fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
