//! csv-rescue CLI - load messy CSV and spreadsheet exports

use clap::Parser;
use csv_rescue::delimiter::delimiter_name;
use csv_rescue::{
    Detection, EncodingInfo, LoadJob, LoadOptions, LoadResult, Loader, MemoryEngine,
    PreambleDetector, RawFile,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Load messy CSV, TSV and spreadsheet files into typed tables.
///
/// Detects encoding, delimiter and header, repairs broken quoting and falls back through
/// increasingly permissive parse strategies until the file loads.
#[derive(Parser, Debug)]
#[command(name = "csv-rescue")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file(s) to load
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Table name (only with a single input file)
    #[arg(short = 't', long)]
    table: Option<String>,

    /// Number of leading lines to skip before the header
    #[arg(short = 's', long, default_value = "0")]
    skip_rows: usize,

    /// Replacement header names, comma separated
    #[arg(long, value_delimiter = ',')]
    headers: Option<Vec<String>>,

    /// Worksheet to extract from workbooks (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Detect preamble lines and multi-row headers before loading
    #[arg(long)]
    preamble: bool,

    /// Only run detection, do not load
    #[arg(long)]
    detect_only: bool,

    /// Output format: text (default) or json
    #[arg(short = 'f', long, default_value = "text")]
    format: OutputFormat,

    /// Show column names and types
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    if args.table.is_some() && args.files.len() > 1 {
        eprintln!("Error: --table can only be used with a single input file");
        return ExitCode::FAILURE;
    }

    let loader = Loader::new(MemoryEngine::new());
    let mut exit_code = ExitCode::SUCCESS;

    if args.detect_only {
        for path in &args.files {
            if let Err(e) = detect_file(&loader, path, &args) {
                eprintln!("Error processing {}: {}", path.display(), e);
                exit_code = ExitCode::FAILURE;
            }
        }
        return exit_code;
    }

    let mut jobs = Vec::with_capacity(args.files.len());
    let mut paths = Vec::with_capacity(args.files.len());
    let mut notes = Vec::with_capacity(args.files.len());
    for path in &args.files {
        match build_job(&loader, path, &args) {
            Ok((job, planned)) => {
                jobs.push(job);
                paths.push(path);
                notes.push(planned);
            }
            Err(e) => {
                eprintln!("Error processing {}: {}", path.display(), e);
                exit_code = ExitCode::FAILURE;
            }
        }
    }

    for ((path, planned), result) in paths.into_iter().zip(notes).zip(loader.load_many(&jobs)) {
        match result {
            Ok(mut result) => {
                result.warnings.extend(planned);
                match args.format {
                    OutputFormat::Text => print_text_output(path, &result, args.verbose),
                    OutputFormat::Json => print_json_output(path, &result, args.verbose),
                }
            }
            Err(e) => {
                eprintln!("Error processing {}: {}", path.display(), e);
                exit_code = ExitCode::FAILURE;
            }
        }
    }

    exit_code
}

fn cli_options(args: &Args) -> LoadOptions {
    LoadOptions {
        skip_rows: args.skip_rows,
        custom_headers: args.headers.clone(),
        sheet: args.sheet.clone(),
    }
}

/// Read `path` and work out its load options. Structure planning only applies when the
/// caller gave no explicit skip or header overrides.
fn build_job(
    loader: &Loader<MemoryEngine>,
    path: &Path,
    args: &Args,
) -> Result<(LoadJob, Vec<String>), Box<dyn std::error::Error>> {
    let file = RawFile::from_path(path)?;
    let mut options = cli_options(args);
    let mut planned = Vec::new();

    if args.preamble && options.skip_rows == 0 && options.custom_headers.is_none() {
        let (structure, warnings) =
            loader.plan_structure(&file, args.sheet.as_deref(), PreambleDetector::new)?;
        options = structure;
        planned = warnings;
    }

    Ok((
        LoadJob {
            file,
            table_name: args.table.clone(),
            options,
        },
        planned,
    ))
}

fn detect_file(
    loader: &Loader<MemoryEngine>,
    path: &Path,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = RawFile::from_path(path)?;
    let detection = loader.detect(&file, &cli_options(args))?;

    match args.format {
        OutputFormat::Text => print_text_detection(path, &detection),
        OutputFormat::Json => print_json_detection(path, &detection),
    }
    Ok(())
}

fn encoding_label(info: &EncodingInfo) -> String {
    if info.has_bom {
        format!("{} (BOM)", info.encoding)
    } else {
        info.encoding.to_string()
    }
}

fn print_warnings_text(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("  Warnings:");
    for warning in warnings {
        println!("    - {warning}");
    }
}

fn print_text_output(path: &Path, result: &LoadResult, verbose: bool) {
    println!("File: {}", path.display());
    println!("  Table: {}", result.table_name);
    println!("  Rows: {}", result.row_count);
    println!("  Strategy: {}", result.strategy);
    println!("  Encoding: {}", encoding_label(&result.encoding));
    println!("  Delimiter: {}", delimiter_name(result.delimiter));

    if verbose {
        println!("  Columns:");
        for (i, column) in result.columns.iter().enumerate() {
            let nullable = if column.nullable { ", nullable" } else { "" };
            println!("    {}: {} ({}{})", i + 1, column.name, column.column_type, nullable);
        }
    }

    print_warnings_text(&result.warnings);
    println!();
}

fn print_text_detection(path: &Path, detection: &Detection) {
    println!("File: {}", path.display());
    println!("  Encoding: {}", encoding_label(&detection.encoding));
    println!(
        "  Delimiter: {} (confidence {:.2})",
        detection.delimiter.display_name(),
        detection.delimiter.confidence
    );
    println!(
        "  Has header: {} (confidence {:.2})",
        detection.header.has_header, detection.header.confidence
    );
    println!("  Lines: {}", detection.line_count);
    println!("  Columns: {}", detection.columns.join(", "));
    print_warnings_text(&detection.warnings);
    println!();
}

/// Quote and escape `s` as a JSON string.
fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn json_array(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| json_string(s)).collect();
    format!("[{}]", quoted.join(","))
}

fn print_json_output(path: &Path, result: &LoadResult, verbose: bool) {
    print!(
        r#"{{"file":{},"table":{},"rows":{},"strategy":"{}","encoding":"{}","has_bom":{},"delimiter":{},"warnings":{}"#,
        json_string(&path.display().to_string()),
        json_string(&result.table_name),
        result.row_count,
        result.strategy,
        result.encoding.encoding,
        result.encoding.has_bom,
        json_string(&result.delimiter.to_string()),
        json_array(&result.warnings)
    );

    if verbose {
        print!(r#","columns":["#);
        for (i, column) in result.columns.iter().enumerate() {
            if i > 0 {
                print!(",");
            }
            print!(
                r#"{{"name":{},"type":"{}","nullable":{}}}"#,
                json_string(&column.name),
                column.column_type,
                column.nullable
            );
        }
        print!("]");
    }

    println!("}}");
}

fn print_json_detection(path: &Path, detection: &Detection) {
    println!(
        r#"{{"file":{},"encoding":"{}","has_bom":{},"delimiter":{},"delimiter_confidence":{},"has_header":{},"header_confidence":{},"lines":{},"columns":{},"warnings":{}}}"#,
        json_string(&path.display().to_string()),
        detection.encoding.encoding,
        detection.encoding.has_bom,
        json_string(&detection.delimiter.delimiter.to_string()),
        detection.delimiter.confidence,
        detection.header.has_header,
        detection.header.confidence,
        detection.line_count,
        json_array(&detection.columns),
        json_array(&detection.warnings)
    );
}
