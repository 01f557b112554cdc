//! Nearest-match suggestions for unresolved symbols.
//!
//! Suggestions only enrich error messages; they never change what an
//! expression evaluates to.

/// Levenshtein edit distance between two strings, by `char`.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Rank `candidates` by edit distance to the lowercased `symbol`.
///
/// Dotted candidates (`layer.cornerRadius`) are only considered when the
/// symbol is itself dotted, or when the candidate extends the symbol
/// (`layer` -> `layer.cornerRadius`). Ties are broken alphabetically so the
/// ordering is deterministic.
pub fn best_matches<I, S>(symbol: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let lower_symbol = symbol.to_lowercase();
    let dotted_symbol = symbol.contains('.');
    let prefix = format!("{lower_symbol}.");

    let mut ranked: Vec<(usize, String)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let candidate = candidate.as_ref();
            let lower = candidate.to_lowercase();
            if lower.contains('.') && !dotted_symbol && !lower.starts_with(&prefix) {
                return None;
            }
            Some((edit_distance(&lower, &lower_symbol), candidate.to_owned()))
        })
        .collect();

    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    ranked.dedup_by(|a, b| a.1 == b.1);
    ranked.into_iter().map(|(_, name)| name).collect()
}

/// Rank the members of a static type for a failed `Type.member` lookup.
///
/// Members that repeat the type name as a prefix (`contentModeScaleToFill` on
/// `ContentMode`) are compared without it, so `scaletofil` still finds them.
pub fn best_member_matches<I, S>(type_name: &str, member: &str, members: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let short_type = type_name.rsplit('.').next().unwrap_or(type_name);
    let query = strip_type_prefix(short_type, member).to_lowercase();

    let mut ranked: Vec<(usize, String)> = members
        .into_iter()
        .map(|m| {
            let m = m.as_ref();
            let stripped = strip_type_prefix(short_type, m).to_lowercase();
            (edit_distance(&stripped, &query), m.to_owned())
        })
        .collect();

    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    ranked.into_iter().map(|(_, name)| name).collect()
}

/// Remove a case-insensitive `type_name` prefix from `name`, if present and
/// something remains.
pub fn strip_type_prefix<'a>(type_name: &str, name: &'a str) -> &'a str {
    if name.len() > type_name.len()
        && name.is_char_boundary(type_name.len())
        && name[..type_name.len()].eq_ignore_ascii_case(type_name)
    {
        &name[type_name.len()..]
    } else {
        name
    }
}
