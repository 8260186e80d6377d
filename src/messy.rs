//! Generators for deliberately messy input files.
//!
//! Real exports arrive with byte-order marks, legacy code pages, spreadsheet smart quotes,
//! European number formats, report preambles and broken quoting. [`MessyCsv`] renders a grid
//! of cells with any mix of those defects, and [`encode`] writes the text in any supported
//! encoding.

use crate::encoding::{Encoding, windows_1252_byte};
use crate::metadata::RawFile;

/// Text encoded as `encoding`, optionally preceded by its byte-order mark.
///
/// Characters the target cannot represent become `?`. Windows-1252 and ISO-8859-1 have no
/// byte-order mark, so `bom` is ignored for them.
pub fn encode(text: &str, encoding: Encoding, bom: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    match encoding {
        Encoding::UTF8 => {
            if bom {
                out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
            }
            out.extend_from_slice(text.as_bytes());
        }
        Encoding::UTF16LE => {
            if bom {
                out.extend_from_slice(&[0xFF, 0xFE]);
            }
            text.encode_utf16().for_each(|u| out.extend_from_slice(&u.to_le_bytes()));
        }
        Encoding::UTF16BE => {
            if bom {
                out.extend_from_slice(&[0xFE, 0xFF]);
            }
            text.encode_utf16().for_each(|u| out.extend_from_slice(&u.to_be_bytes()));
        }
        Encoding::UTF32LE => {
            if bom {
                out.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x00]);
            }
            text.chars().for_each(|c| out.extend_from_slice(&(c as u32).to_le_bytes()));
        }
        Encoding::UTF32BE => {
            if bom {
                out.extend_from_slice(&[0x00, 0x00, 0xFE, 0xFF]);
            }
            text.chars().for_each(|c| out.extend_from_slice(&(c as u32).to_be_bytes()));
        }
        Encoding::Windows1252 => {
            out.extend(text.chars().map(|c| windows_1252_byte(c).unwrap_or(b'?')));
        }
        Encoding::ISO8859_1 => {
            out.extend(text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')));
        }
    }
    out
}

/// A grid of cells rendered with configurable defects.
///
/// # Example
///
/// ```
/// use csv_rescue::messy::MessyCsv;
///
/// let text = MessyCsv::new(vec![vec!["a", "b"], vec!["1", "2"]])
///     .delimiter(';')
///     .line_ending("\r\n")
///     .render();
/// assert_eq!(text, "a;b\r\n1;2\r\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessyCsv {
    rows: Vec<Vec<String>>,
    delimiter: char,
    line_ending: &'static str,
    preamble: Vec<String>,
    quote_all: bool,
    smart_quotes: bool,
    doubled_quotes: bool,
    non_breaking_spaces: bool,
    zero_width: bool,
}

impl MessyCsv {
    /// Start from a clean grid.
    pub fn new<R, S>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
            delimiter: ',',
            line_ending: "\n",
            preamble: Vec::new(),
            quote_all: false,
            smart_quotes: false,
            doubled_quotes: false,
            non_breaking_spaces: false,
            zero_width: false,
        }
    }

    /// Field delimiter.
    pub fn delimiter(&mut self, delimiter: char) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    /// Line terminator, e.g. `"\r\n"` or `"\r"`.
    pub fn line_ending(&mut self, line_ending: &'static str) -> &mut Self {
        self.line_ending = line_ending;
        self
    }

    /// Lines written before the header, like a report title.
    pub fn preamble<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preamble = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Wrap every cell in double quotes, numbers included.
    pub fn quote_all(&mut self, yes: bool) -> &mut Self {
        self.quote_all = yes;
        self
    }

    /// Use typographic quotes instead of `"` around quoted cells.
    pub fn smart_quotes(&mut self, yes: bool) -> &mut Self {
        self.smart_quotes = yes;
        self
    }

    /// Quote text cells twice over (`""text""`), as some exporters do.
    pub fn doubled_quotes(&mut self, yes: bool) -> &mut Self {
        self.doubled_quotes = yes;
        self
    }

    /// Replace spaces inside cells with U+00A0.
    pub fn non_breaking_spaces(&mut self, yes: bool) -> &mut Self {
        self.non_breaking_spaces = yes;
        self
    }

    /// Append a zero-width space to every header cell.
    pub fn zero_width(&mut self, yes: bool) -> &mut Self {
        self.zero_width = yes;
        self
    }

    fn render_cell(&self, cell: &str, header: bool) -> String {
        let mut text = cell.to_string();
        if self.non_breaking_spaces {
            text = text.replace(' ', "\u{00A0}");
        }
        if self.zero_width && header {
            text.push('\u{200B}');
        }

        let numeric = crate::field_type::is_numeric(cell);
        let needs_quotes = self.quote_all
            || text.contains(self.delimiter)
            || text.contains('"')
            || text.contains('\n');
        let (open, close) = if self.smart_quotes {
            ("\u{201C}", "\u{201D}")
        } else {
            ("\"", "\"")
        };

        if self.doubled_quotes && !numeric && !header {
            format!("{open}{open}{text}{close}{close}")
        } else if needs_quotes {
            format!("{open}{}{close}", text.replace('"', "\"\""))
        } else {
            text
        }
    }

    /// Render the grid as text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push_str(self.line_ending);
        }
        let delimiter = self.delimiter.to_string();
        for (i, row) in self.rows.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|c| self.render_cell(c, i == 0)).collect();
            out.push_str(&cells.join(&delimiter));
            out.push_str(self.line_ending);
        }
        out
    }

    /// Render and encode.
    pub fn encode(&self, encoding: Encoding, bom: bool) -> Vec<u8> {
        encode(&self.render(), encoding, bom)
    }

    /// Render and encode as a named file.
    pub fn raw_file(&self, name: &str, encoding: Encoding, bom: bool) -> RawFile {
        RawFile::new(name, self.encode(encoding, bom))
    }
}

/// A semicolon-delimited export with decimal commas, as written by European spreadsheet
/// locales. Four data rows.
pub fn european_sales() -> MessyCsv {
    let mut csv = MessyCsv::new(vec![
        vec!["Produkt", "Menge", "Preis", "Größe"],
        vec!["Äpfel", "12", "1,50", "groß"],
        vec!["Birnen", "7", "2,25", "mittel"],
        vec!["Käse", "3", "10,99", "klein"],
        vec!["Brötchen", "40", "0,45", "klein"],
    ]);
    csv.delimiter(';').line_ending("\r\n");
    csv
}

/// Comma-delimited text where the third data row opens a quote it never closes.
pub fn unbalanced_quote() -> String {
    [
        "id,name,comment",
        "1,Alice,fine",
        "2,Bob,\"all good",
        "3,Carol,broken \"quote here",
        "4,Dave,ok",
        "",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{classify, decode};

    #[test]
    fn test_encode_round_trips_through_classifier() {
        let text = "name,city\nJosé,Zürich\n";
        for encoding in [
            Encoding::UTF8,
            Encoding::UTF16LE,
            Encoding::UTF16BE,
            Encoding::UTF32LE,
            Encoding::UTF32BE,
        ] {
            let bytes = encode(text, encoding, true);
            let info = classify(&bytes);
            assert_eq!(info.encoding, encoding);
            assert!(info.has_bom);
            assert_eq!(decode(&bytes, &info), text);
        }
    }

    #[test]
    fn test_encode_windows_1252() {
        let bytes = encode("“price” €5", Encoding::Windows1252, false);
        assert_eq!(bytes, vec![0x93, b'p', b'r', b'i', b'c', b'e', 0x94, b' ', 0x80, b'5']);
        assert_eq!(encode("日本", Encoding::ISO8859_1, false), b"??".to_vec());
    }

    #[test]
    fn test_render_defects() {
        let text = MessyCsv::new(vec![vec!["Full Name", "Age"], vec!["Ann Lee", "30"]])
            .doubled_quotes(true)
            .non_breaking_spaces(true)
            .render();
        assert_eq!(text, "Full\u{00A0}Name,Age\n\"\"Ann\u{00A0}Lee\"\",30\n");

        let smart = MessyCsv::new(vec![vec!["a"], vec!["x"]])
            .quote_all(true)
            .smart_quotes(true)
            .render();
        assert_eq!(smart, "\u{201C}a\u{201D}\n\u{201C}x\u{201D}\n");
    }

    #[test]
    fn test_preamble_and_zero_width() {
        let text = MessyCsv::new(vec![vec!["h"], vec!["1"]])
            .preamble(["Report", ""])
            .zero_width(true)
            .render();
        assert_eq!(text, "Report\n\nh\u{200B}\n1\n");
    }

    #[test]
    fn test_unbalanced_quote_fixture() {
        let text = unbalanced_quote();
        assert_eq!(text.lines().count(), 5);
        let broken = text.lines().nth(2).unwrap();
        assert_eq!(bytecount::count(broken.as_bytes(), b'"'), 1);
        assert!(broken.ends_with("\"all good"));
    }
}
