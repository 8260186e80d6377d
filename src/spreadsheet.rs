//! Single-sheet extraction from spreadsheet workbooks (`.xlsx`, `.xlsm`, `.xls`, `.ods`).
//!
//! The chosen sheet is written out as comma-delimited text so it can go through the same
//! sanitize/infer/load path as a CSV file.

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::error::{RescueError, Result};

/// Which sheet to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Sheet name. `None` selects the first sheet.
    pub sheet: Option<String>,
}

/// One extracted sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSheet {
    /// Comma-delimited text, one line per non-blank row.
    pub text: String,
    /// Name of the extracted sheet.
    pub sheet_name: String,
    /// Number of sheets in the workbook.
    pub sheet_count: usize,
    /// Every sheet name, in workbook order.
    pub all_sheet_names: Vec<String>,
}

impl ExtractedSheet {
    /// Sheets that were not extracted.
    pub fn ignored_sheets(&self) -> Vec<&str> {
        self.all_sheet_names
            .iter()
            .filter(|name| **name != self.sheet_name)
            .map(String::as_str)
            .collect()
    }

    /// Warning naming the ignored sheets, if there are any.
    pub fn warning(&self) -> Option<String> {
        let ignored = self.ignored_sheets();
        if ignored.is_empty() {
            return None;
        }
        Some(format!(
            "Workbook has {} sheets; loaded '{}' and ignored: {}",
            self.sheet_count,
            self.sheet_name,
            ignored.join(", ")
        ))
    }
}

/// Extract one sheet of a workbook as comma-delimited text.
///
/// Blank rows are dropped. Cells are written as display text: whole numbers without a
/// fractional part, dates as ISO 8601, errors as their `#...` code.
pub fn extract(bytes: &[u8], options: &ExtractOptions) -> Result<ExtractedSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let all_sheet_names = workbook.sheet_names();
    let sheet_name = match &options.sheet {
        Some(name) => all_sheet_names
            .iter()
            .find(|s| *s == name)
            .cloned()
            .ok_or_else(|| RescueError::SheetNotFound {
                name: name.clone(),
                available: all_sheet_names.clone(),
            })?,
        None => all_sheet_names.first().cloned().ok_or(RescueError::EmptySheet)?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        writer.write_record(&cells)?;
    }
    let bytes = writer.into_inner().map_err(|e| RescueError::Io(e.into_error()))?;

    Ok(ExtractedSheet {
        text: String::from_utf8_lossy(&bytes).into_owned(),
        sheet_name,
        sheet_count: all_sheet_names.len(),
        all_sheet_names,
    })
}

/// Display text of a single cell.
///
/// Numbers are rendered from their stored value; calamine does not hand back the cell's
/// number format. A zip code typed as the number 2134 and displayed through a `00000`
/// format comes out as `2134`. Identifiers that need their leading zeros must be stored
/// as text in the workbook.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) if dt.is_datetime() => format_excel_serial(dt.as_f64()),
        Data::DateTime(dt) => format_float(dt.as_f64()),
        Data::Error(e) => e.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// Format a 1900-system Excel serial number as `YYYY-MM-DD`, with ` HH:MM:SS` when it has
/// a time part.
pub fn format_excel_serial(serial: f64) -> String {
    // Serials below 61 predate the phantom 1900-02-29.
    let adjusted = if serial < 61.0 { serial + 1.0 } else { serial };
    let days = adjusted.floor();
    let seconds = ((adjusted - days) * 86_400.0).round() as i64;
    let (days, seconds) = if seconds >= 86_400 {
        (days as i64 + 1, seconds - 86_400)
    } else {
        (days as i64, seconds)
    };

    // 1899-12-30 is day 0; 1970-01-01 is day 25569.
    let (y, m, d) = civil_from_days(days - 25_569);
    if seconds == 0 {
        format!("{y:04}-{m:02}-{d:02}")
    } else {
        format!(
            "{y:04}-{m:02}-{d:02} {:02}:{:02}:{:02}",
            seconds / 3600,
            seconds % 3600 / 60,
            seconds % 60
        )
    }
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}
