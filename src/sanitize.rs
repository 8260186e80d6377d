//! Content sanitization for decoded text.
//!
//! Sanitization is an ordered list of small, pure text rules. Every rule is best-effort
//! cosmetic surgery, not a parser: the quote-repair rules work one line at a time and will
//! misfire on quoted fields that legitimately span several lines.
//!
//! [`sanitize`] runs the rule list until the text stops changing, so the result is always a
//! fixed point: `sanitize(sanitize(x)) == sanitize(x)`.

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::sync::LazyLock;

use regex::Regex;

/// A named text transformation applied during sanitization.
#[derive(Clone, Copy)]
pub struct Rule {
    /// Short identifier used in logs and tests.
    pub name: &'static str,
    /// The transformation. Returns `Cow::Borrowed` when nothing changed.
    pub apply: fn(&str) -> Cow<'_, str>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Sanitization rules in application order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "line_endings",
        apply: normalize_line_endings,
    },
    Rule {
        name: "control_characters",
        apply: strip_control_characters,
    },
    Rule {
        name: "smart_quotes",
        apply: replace_smart_quotes,
    },
    Rule {
        name: "invisible_characters",
        apply: strip_invisible_characters,
    },
    Rule {
        name: "doubled_field_quotes",
        apply: collapse_doubled_field_quotes,
    },
    Rule {
        name: "quote_runs",
        apply: collapse_quote_runs,
    },
    Rule {
        name: "quoted_numbers",
        apply: unquote_numbers,
    },
];

/// Text that has passed through [`sanitize`].
///
/// Line endings are `\n`, and there are no zero-width characters, smart quotes, or control
/// characters other than `\t` and `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SanitizedText(String);

impl SanitizedText {
    /// Borrow the text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for SanitizedText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SanitizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sanitize decoded text by applying [`RULES`] until a fixed point is reached.
///
/// No rule lengthens the text, so the loop terminates.
pub fn sanitize(text: &str) -> SanitizedText {
    let mut current = text.to_owned();
    while let Some(next) = apply_rules(&current) {
        if next == current {
            break;
        }
        current = next;
    }
    SanitizedText(current)
}

/// Apply every rule once, in order. Returns `None` when no rule changed anything.
fn apply_rules(text: &str) -> Option<String> {
    let mut current: Option<String> = None;
    for rule in RULES {
        let input = current.as_deref().unwrap_or(text);
        let next = match (rule.apply)(input) {
            Cow::Borrowed(_) => None,
            Cow::Owned(changed) => Some(changed),
        };
        if next.is_some() {
            current = next;
        }
    }
    current
}

/// `\r\n` and lone `\r` become `\n`.
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Removes NUL and every other control character except tab and newline.
pub fn strip_control_characters(text: &str) -> Cow<'_, str> {
    let keep = |c: char| !c.is_control() || c == '\t' || c == '\n';
    if text.chars().all(keep) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|&c| keep(c)).collect())
}

/// Curly single and double quotes become ASCII quotes.
pub fn replace_smart_quotes(text: &str) -> Cow<'_, str> {
    let is_smart = |c: char| matches!(c, '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}');
    if !text.chars().any(is_smart) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| match c {
                '\u{2018}' | '\u{2019}' => '\'',
                '\u{201C}' | '\u{201D}' => '"',
                other => other,
            })
            .collect(),
    )
}

/// Zero-width characters are removed and non-breaking spaces become plain spaces.
pub fn strip_invisible_characters(text: &str) -> Cow<'_, str> {
    let is_invisible = |c: char| matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{00A0}');
    if !text.chars().any(is_invisible) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .filter_map(|c| match c {
                '\u{200B}'..='\u{200D}' | '\u{FEFF}' => None,
                '\u{00A0}' => Some(' '),
                other => Some(other),
            })
            .collect(),
    )
}

/// `""text""` between field boundaries.
static DOUBLED_FIELD_QUOTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(^|[,;\t|])""([^"\n]+)""([,;\t|]|$)"#)
        .expect("Invalid doubled field quotes pattern")
});

/// Three or more consecutive double quotes.
static QUOTE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""{3,}"#).expect("Invalid quote run pattern"));

/// A quoted bare number between field boundaries. Numbers with a leading zero are left
/// alone so identifiers like `"007"` keep their padding.
static QUOTED_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(^|[,;\t|])"(-?(?:0|[1-9]\d*)(?:\.\d+)?)"([,;\t|]|$)"#)
        .expect("Invalid quoted number pattern")
});

/// `,""text""` at a field boundary becomes `,"text"`.
pub fn collapse_doubled_field_quotes(text: &str) -> Cow<'_, str> {
    if !text.contains("\"\"") {
        return Cow::Borrowed(text);
    }
    DOUBLED_FIELD_QUOTES.replace_all(text, "${1}\"${2}\"${3}")
}

/// Runs of three or more `"` collapse to one.
pub fn collapse_quote_runs(text: &str) -> Cow<'_, str> {
    if !text.contains("\"\"\"") {
        return Cow::Borrowed(text);
    }
    QUOTE_RUN.replace_all(text, "\"")
}

/// Quotes around a bare numeric field are dropped unless the field sits inside a quoted span
/// that opened earlier on the same line (odd count of `"` before it).
pub fn unquote_numbers(text: &str) -> Cow<'_, str> {
    if !text.contains('"') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    for line in text.split_inclusive('\n') {
        match unquote_numbers_in_line(line) {
            Cow::Borrowed(l) => out.push_str(l),
            Cow::Owned(l) => {
                changed = true;
                out.push_str(&l);
            }
        }
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(text)
    }
}

fn unquote_numbers_in_line(line: &str) -> Cow<'_, str> {
    let mut out = String::new();
    let mut last = 0;

    for caps in QUOTED_NUMBER.captures_iter(line) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let open = whole.start() + caps.get(1).map_or(0, |m| m.len());
        if bytecount::count(&line.as_bytes()[..open], b'"') % 2 != 0 {
            continue;
        }
        out.push_str(&line[last..open]);
        out.push_str(number.as_str());
        // Skip the number and its closing quote.
        last = number.end() + 1;
    }

    if last == 0 {
        return Cow::Borrowed(line);
    }
    out.push_str(&line[last..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endings() {
        assert_eq!(sanitize("a,b\r\nc,d\re,f\n").as_str(), "a,b\nc,d\ne,f\n");
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(sanitize("a\0,b\x07\tc\x1A\n").as_str(), "a,b\tc\n");
    }

    #[test]
    fn test_smart_quotes() {
        assert_eq!(
            sanitize("\u{201C}hello\u{201D},\u{2018}x\u{2019}").as_str(),
            "\"hello\",'x'"
        );
    }

    #[test]
    fn test_invisible_characters() {
        assert_eq!(
            sanitize("\u{FEFF}id,\u{200B}name\u{00A0}x").as_str(),
            "id,name x"
        );
    }

    #[test]
    fn test_doubled_field_quotes() {
        assert_eq!(
            collapse_doubled_field_quotes("1,\"\"Acme Inc\"\",3"),
            "1,\"Acme Inc\",3"
        );
        assert_eq!(sanitize("\"\"name\"\",age\n").as_str(), "\"name\",age\n");
    }

    #[test]
    fn test_quote_runs() {
        assert_eq!(collapse_quote_runs("a,\"\"\"\"b"), "a,\"b");
        assert_eq!(collapse_quote_runs("a,\"\"b"), "a,\"\"b");
    }

    #[test]
    fn test_quoted_numbers() {
        assert_eq!(sanitize("name,\"42\",\"3.5\"\n").as_str(), "name,42,3.5\n");
        // Leading zeros keep their quotes.
        assert_eq!(sanitize("\"007\",x").as_str(), "\"007\",x");
        // Inside an open quoted span the number is left alone.
        assert_eq!(
            unquote_numbers_in_line("\"note,\"12\",more\""),
            "\"note,\"12\",more\""
        );
    }

    #[test]
    fn test_rules_are_ordered() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(names.first(), Some(&"line_endings"));
        assert_eq!(names.last(), Some(&"quoted_numbers"));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "a,b\r\n\"\"x\"\",\"\"\"\"y\r",
            "\u{201C}1\u{201D},\"2\",\"3\"\n\u{FEFF}",
            "\"a,\"\"\"1\"\"\",b\n\"\"\"\"",
            ",\"\"\"\"\"\",\"-0.5\",\"\"9\"\"",
            "plain text",
            "",
        ];
        for input in inputs {
            let once = sanitize(input);
            let twice = sanitize(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_unchanged_text_is_borrowed() {
        for rule in RULES {
            assert!(matches!((rule.apply)("a,b\n1,2\n"), Cow::Borrowed(_)), "{}", rule.name);
        }
    }
}
