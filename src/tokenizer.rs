//! Quote-aware line tokenizer shared by delimiter inference, header detection and
//! column-name extraction.
//!
//! Outside a quoted span, either `"` or `'` opens one; the same character closes it, and a
//! doubled quote character inside the span is an escaped literal. An unterminated span simply
//! runs to the end of the line.

/// Split one line into fields.
///
/// Quote characters that open or close a span are not part of the field. Fields are not
/// trimmed.
pub fn tokenize_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut open_quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match open_quote {
            Some(q) if c == q => {
                if chars.peek() == Some(&q) {
                    current.push(q);
                    chars.next();
                } else {
                    open_quote = None;
                }
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => open_quote = Some(c),
            None if c == delimiter => fields.push(std::mem::take(&mut current)),
            None => current.push(c),
        }
    }

    fields.push(current);
    fields
}

/// Count delimiter occurrences outside quoted spans, with the same quote rules as
/// [`tokenize_line`].
pub fn count_delimiters(line: &str, delimiter: char) -> usize {
    let mut count = 0;
    let mut open_quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match open_quote {
            Some(q) if c == q => {
                if chars.peek() == Some(&q) {
                    chars.next();
                } else {
                    open_quote = None;
                }
            }
            Some(_) => {}
            None if c == '"' || c == '\'' => open_quote = Some(c),
            None if c == delimiter => count += 1,
            None => {}
        }
    }

    count
}

/// Iterate over lines that contain something other than whitespace.
pub fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|l| !l.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_split() {
        assert_eq!(tokenize_line("a,b,c", ','), vec!["a", "b", "c"]);
        assert_eq!(tokenize_line("a\tb", '\t'), vec!["a", "b"]);
    }

    #[test]
    fn test_quoted_delimiter() {
        assert_eq!(tokenize_line("a,\"b,c\",d", ','), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn test_doubled_quote_escape() {
        assert_eq!(tokenize_line("a,\"b\"\"c\",d", ','), vec!["a", "b\"c", "d"]);
    }

    #[test]
    fn test_single_quotes() {
        assert_eq!(tokenize_line("'x;y';z", ';'), vec!["x;y", "z"]);
        // A double quote inside a single-quoted span is literal.
        assert_eq!(tokenize_line("'a\"b',c", ','), vec!["a\"b", "c"]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(tokenize_line("a,\"b,c", ','), vec!["a", "b,c"]);
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(tokenize_line("", ','), vec![""]);
        assert_eq!(tokenize_line(",,", ','), vec!["", "", ""]);
    }

    #[test]
    fn test_count_delimiters() {
        assert_eq!(count_delimiters("a,b,c", ','), 2);
        assert_eq!(count_delimiters("\"a,1\",\"b,2\"", ','), 1);
        assert_eq!(count_delimiters("a;b", ','), 0);
    }

    #[test]
    fn test_non_blank_lines() {
        let lines: Vec<&str> = non_blank_lines("a\n\n  \nb\n").collect();
        assert_eq!(lines, vec!["a", "b"]);
    }
}
