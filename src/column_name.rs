//! Column-name sanitization and de-duplication.

use foldhash::{HashMap, HashMapExt, HashSet, HashSetExt};

/// Maximum length of a sanitized name, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// Name used when nothing usable survives sanitization.
pub const FALLBACK_NAME: &str = "column";

/// Turn a raw header string into a safe identifier.
///
/// The result is ASCII, non-empty, at most [`MAX_NAME_LEN`] characters, never starts with a
/// digit, and contains only `[A-Za-z0-9_-]`.
pub fn sanitize_column_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        match c {
            '"' | '\'' | '`' => {}
            ' ' => out.push('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => out.push(c),
            _ => out.push('_'),
        }
    }

    let mut name = collapse_underscores(&out);
    name = name.trim_matches('_').to_string();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if name.is_empty() {
        name = FALLBACK_NAME.to_string();
    }

    truncate(&name, MAX_NAME_LEN).to_string()
}

fn collapse_underscores(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_underscore = false;
    for c in s.chars() {
        if c == '_' {
            if !prev_underscore {
                out.push(c);
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }
    out
}

/// Sanitized names are ASCII, so byte slicing is character slicing.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() > max { &s[..max] } else { s }
}

/// Sanitize every name and make the results unique, case-insensitively.
///
/// The first occurrence of a name keeps it; later collisions get `_1`, `_2`, ... from a
/// per-name counter, skipping suffixes that are already taken.
pub fn make_unique<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(names.len());

    for raw in names {
        let base = sanitize_column_name(raw.as_ref());
        let key = base.to_ascii_lowercase();

        if taken.insert(key.clone()) {
            out.push(base);
            continue;
        }

        let counter = counters.entry(key).or_insert(0);
        loop {
            *counter += 1;
            let suffix = format!("_{counter}");
            let candidate = format!(
                "{}{suffix}",
                truncate(&base, MAX_NAME_LEN.saturating_sub(suffix.len()))
            );
            if taken.insert(candidate.to_ascii_lowercase()) {
                out.push(candidate);
                break;
            }
        }
    }

    out
}

/// Derive a table name from a file name: the sanitized stem, or `table` when the stem is
/// empty.
pub fn table_name_from_file(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(idx) => &base[..idx],
    };

    if stem.trim().is_empty() {
        return "table".to_string();
    }
    sanitize_column_name(stem)
}
