//! Cell and column types, and the tagged values stored at the engine boundary.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Column type assigned by type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColumnType {
    /// Only null-like cells seen so far. Never reported for a finished column.
    Null,
    /// true/false, yes/no, on/off.
    Boolean,
    /// Whole number that fits in `i64`.
    Integer,
    /// Floating point number.
    Float,
    /// Calendar date (stored as text).
    Date,
    /// Date with time component (stored as text).
    Timestamp,
    /// Anything else.
    #[default]
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Null => "NULL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Text => "VARCHAR",
        };
        f.write_str(name)
    }
}

impl ColumnType {
    /// Returns true if this type is numeric.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Merge two types, returning the most general type that can represent both.
    pub fn merge(self, other: ColumnType) -> ColumnType {
        if self == other {
            return self;
        }
        match (self, other) {
            (ColumnType::Null, t) | (t, ColumnType::Null) => t,
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            (ColumnType::Date, ColumnType::Timestamp)
            | (ColumnType::Timestamp, ColumnType::Date) => ColumnType::Timestamp,
            _ => ColumnType::Text,
        }
    }

    /// Convert a raw cell into a value of this type.
    ///
    /// Null-like cells become [`Value::Null`] for every type except text, where only the
    /// empty string is null. Returns `None` when the cell cannot be represented.
    pub fn parse_value(&self, raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Some(Value::Null);
        }

        match self {
            ColumnType::Text => Some(Value::Text(raw.to_string())),
            _ if is_null_token(trimmed) => Some(Value::Null),
            ColumnType::Null => None,
            ColumnType::Boolean => parse_bool(trimmed).map(Value::Boolean),
            ColumnType::Integer => parse_integer(trimmed).map(Value::Integer),
            ColumnType::Float => trimmed.parse::<f64>().ok().map(Value::Float),
            ColumnType::Date => DATE_PATTERN
                .is_match(trimmed)
                .then(|| Value::Text(trimmed.to_string())),
            ColumnType::Timestamp => (DATETIME_PATTERN.is_match(trimmed)
                || DATE_PATTERN.is_match(trimmed))
            .then(|| Value::Text(trimmed.to_string())),
        }
    }
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing or empty.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// Text, including dates and timestamps.
    Text(String),
    /// Boolean.
    Boolean(bool),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Pattern for dates: ISO (YYYY-MM-DD), US (MM/DD/YYYY) and European (DD.MM.YYYY).
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:\d{4}[-/]\d{1,2}[-/]\d{1,2}",
        r"|\d{1,2}[-/]\d{1,2}[-/]\d{2,4}",
        r"|\d{1,2}\.\d{1,2}\.\d{2,4})$"
    ))
    .expect("Invalid date pattern")
});

/// Pattern for datetimes (YYYY-MM-DDTHH:MM[:SS][.fff][zone]).
static DATETIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}[T ]\d{1,2}:\d{2}(:\d{2})?(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$",
    )
    .expect("Invalid datetime pattern")
});

/// Check for NULL-like values using string matching instead of regex.
#[inline]
pub fn is_null_token(s: &str) -> bool {
    matches!(
        s,
        "null"
            | "NULL"
            | "Null"
            | "none"
            | "None"
            | "NONE"
            | "na"
            | "NA"
            | "n/a"
            | "N/A"
            | "nan"
            | "NaN"
            | "NAN"
            | "#N/A"
            | "#VALUE!"
            | "#REF!"
            | "#DIV/0!"
    )
}

#[inline]
fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true")
        || s.eq_ignore_ascii_case("yes")
        || s.eq_ignore_ascii_case("on")
    {
        Some(true)
    } else if s.eq_ignore_ascii_case("false")
        || s.eq_ignore_ascii_case("no")
        || s.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        None
    }
}

#[inline]
fn parse_integer(s: &str) -> Option<i64> {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok()
}

/// True when `s` parses as a number. Words like `nan` or `inf` do not count.
pub fn is_numeric(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.bytes().any(|b| b.is_ascii_digit()) && trimmed.parse::<f64>().is_ok()
}

/// Detect the type of a single cell value.
pub fn detect_cell_type(value: &str) -> ColumnType {
    let trimmed = value.trim();
    if trimmed.is_empty() || is_null_token(trimmed) {
        return ColumnType::Null;
    }
    if parse_integer(trimmed).is_some() {
        return ColumnType::Integer;
    }
    if is_numeric(trimmed) {
        return ColumnType::Float;
    }
    if parse_bool(trimmed).is_some() {
        return ColumnType::Boolean;
    }
    if DATETIME_PATTERN.is_match(trimmed) {
        return ColumnType::Timestamp;
    }
    if DATE_PATTERN.is_match(trimmed) {
        return ColumnType::Date;
    }
    ColumnType::Text
}

/// Infer one column type from a sequence of cells. All-null columns are text.
pub fn infer_column_type<'a, I>(cells: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = ColumnType::Null;
    for cell in cells {
        merged = merged.merge(detect_cell_type(cell));
        if merged == ColumnType::Text {
            break;
        }
    }
    if merged == ColumnType::Null {
        ColumnType::Text
    } else {
        merged
    }
}
