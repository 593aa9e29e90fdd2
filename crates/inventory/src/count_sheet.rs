//! Physical count sheets (two-column CSV: SKU code, physical quantity).
//!
//! Sheets come from spreadsheets exported in whatever locale the counter's
//! laptop uses, so the delimiter and the column layout are detected rather
//! than assumed.

use serde::Serialize;
use thiserror::Error;

use crate::reconciliation::CountMatch;

/// Delimiters tried, in tie-break order.
pub const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Header of the downloadable template.
pub const TEMPLATE_HEADER: [&str; 2] = ["SKU Code", "Physical Qty"];

const SKU_ALIASES: &[&str] = &[
    "sku",
    "skucode",
    "code",
    "itemcode",
    "productcode",
    "variantsku",
    "barcode",
];

const QTY_ALIASES: &[&str] = &[
    "physicalqty",
    "physicalquantity",
    "physical",
    "physicalcount",
    "qty",
    "quantity",
    "count",
    "counted",
    "countedqty",
    "stock",
];

const SAMPLE_ROWS: usize = 5;

/// Counts at or above this are rejected as typos or exponent noise.
pub const MAX_COUNT: i64 = 1_000_000_000_000_000;

/// One data row with a usable quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    /// 1-based line in the uploaded file.
    pub line: usize,
    pub sku_code: String,
    pub physical_qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// What the parser saw, returned when a sheet looks wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetDiagnostics {
    pub delimiter: String,
    pub sku_column: Option<String>,
    pub qty_column: Option<String>,
    pub header: Option<Vec<String>>,
    pub sample_rows: Vec<Vec<String>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CountSheetError {
    #[error("file is empty")]
    Empty,

    #[error("file is not valid UTF-8 text")]
    NotText,

    #[error("could not detect SKU and quantity columns")]
    ColumnsNotDetected(SheetDiagnostics),
}

impl CountSheetError {
    pub fn diagnostics(&self) -> Option<&SheetDiagnostics> {
        match self {
            CountSheetError::ColumnsNotDetected(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountSheet {
    pub rows: Vec<CountRow>,
    /// Data rows seen, including skipped and erroneous ones.
    pub total_rows: usize,
    /// Rows whose quantity cell was blank.
    pub skipped: usize,
    pub errors: Vec<RowError>,
    pub diagnostics: SheetDiagnostics,
}

struct Record {
    line: usize,
    fields: csv::StringRecord,
}

impl Record {
    fn is_blank(&self) -> bool {
        self.fields.iter().all(str::is_empty)
    }

    fn cell(&self, idx: usize) -> &str {
        self.fields.get(idx).unwrap_or("")
    }

    fn to_vec(&self) -> Vec<String> {
        self.fields.iter().map(str::to_string).collect()
    }
}

/// Parse an uploaded count sheet.
pub fn parse(bytes: &[u8]) -> Result<CountSheet, CountSheetError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CountSheetError::NotText)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(CountSheetError::Empty);
    }

    let delimiter = detect_delimiter(text);
    let (records, read_errors) = read_records(text, delimiter);
    let mut records = records.into_iter().filter(|r| !r.is_blank());
    let Some(first) = records.next() else {
        return Err(CountSheetError::Empty);
    };
    let rest: Vec<Record> = records.collect();

    let mut diagnostics = SheetDiagnostics {
        delimiter: delimiter_name(delimiter).to_string(),
        sample_rows: std::iter::once(&first)
            .chain(rest.iter())
            .take(SAMPLE_ROWS)
            .map(Record::to_vec)
            .collect(),
        ..SheetDiagnostics::default()
    };

    let (sku_col, qty_col, data): (usize, usize, Vec<&Record>) =
        if let Some((s, q)) = header_columns(&first) {
            diagnostics.header = Some(first.to_vec());
            diagnostics.sku_column = Some(first.cell(s).to_string());
            diagnostics.qty_column = Some(first.cell(q).to_string());
            (s, q, rest.iter().collect())
        } else if first.fields.len() >= 2 && parse_qty(first.cell(1)).is_ok() {
            diagnostics.sku_column = Some("column 1".into());
            diagnostics.qty_column = Some("column 2".into());
            (0, 1, std::iter::once(&first).chain(rest.iter()).collect())
        } else {
            return Err(CountSheetError::ColumnsNotDetected(diagnostics));
        };

    let mut sheet = CountSheet {
        rows: Vec::with_capacity(data.len()),
        total_rows: data.len(),
        skipped: 0,
        errors: read_errors,
        diagnostics,
    };

    for record in data {
        let code = record.cell(sku_col);
        let qty = record.cell(qty_col);

        if code.is_empty() {
            sheet.errors.push(RowError {
                line: record.line,
                message: "missing SKU code".into(),
            });
            continue;
        }
        if qty.is_empty() {
            sheet.skipped += 1;
            continue;
        }
        match parse_qty(qty) {
            Ok(physical_qty) => sheet.rows.push(CountRow {
                line: record.line,
                sku_code: code.to_string(),
                physical_qty,
            }),
            Err(message) => sheet.errors.push(RowError {
                line: record.line,
                message: format!("{code}: {message}"),
            }),
        }
    }

    Ok(sheet)
}

/// Outcome of applying a sheet to a session, as reported to the uploader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub total_rows: usize,
    pub matched: usize,
    pub updated: usize,
    pub skipped: usize,
    pub not_found: Vec<String>,
    pub errors: Vec<RowError>,
    pub match_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<SheetDiagnostics>,
}

impl UploadReport {
    /// Diagnostics are attached when fewer than `low_match_threshold` of the
    /// rows carrying a quantity matched a session item.
    pub fn new(sheet: CountSheet, matched: &CountMatch, low_match_threshold: f64) -> Self {
        let attempted = sheet.total_rows - sheet.skipped;
        let match_rate = if attempted == 0 {
            0.0
        } else {
            matched.matched as f64 / attempted as f64
        };

        Self {
            total_rows: sheet.total_rows,
            matched: matched.matched,
            updated: matched.updated,
            skipped: sheet.skipped,
            not_found: matched.not_found.clone(),
            errors: sheet.errors,
            match_rate,
            diagnostics: (match_rate < low_match_threshold).then_some(sheet.diagnostics),
        }
    }
}

/// Template with one blank-quantity row per SKU code.
pub fn render_template<'a>(codes: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = TEMPLATE_HEADER.join(",");
    out.push('\n');
    for code in codes {
        out.push_str(&escape_field(code, ','));
        out.push_str(",\n");
    }
    out
}

fn escape_field(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains('"') || value.contains('\n') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

fn delimiter_name(delimiter: u8) -> &'static str {
    match delimiter {
        b';' => "semicolon",
        b'\t' => "tab",
        b'|' => "pipe",
        _ => "comma",
    }
}

fn reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

/// Pick the candidate that splits the first non-blank record into the most
/// fields. Ties go to the earlier candidate.
fn detect_delimiter(text: &str) -> u8 {
    let mut best = (DELIMITERS[0], 1usize);
    for candidate in DELIMITERS {
        let width = reader(text, candidate)
            .records()
            .filter_map(Result::ok)
            .find(|r| r.iter().any(|f| !f.is_empty()))
            .map_or(0, |r| r.len());
        if width > best.1 {
            best = (candidate, width);
        }
    }
    best.0
}

fn read_records(text: &str, delimiter: u8) -> (Vec<Record>, Vec<RowError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for result in reader(text, delimiter).records() {
        match result {
            Ok(fields) => records.push(Record {
                line: fields.position().map_or(0, |p| p.line() as usize),
                fields,
            }),
            Err(err) => errors.push(RowError {
                line: err.position().map_or(0, |p| p.line() as usize),
                message: err.to_string(),
            }),
        }
    }
    (records, errors)
}

fn normalize_header(cell: &str) -> String {
    cell.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn header_columns(record: &Record) -> Option<(usize, usize)> {
    let names: Vec<String> = record.fields.iter().map(normalize_header).collect();
    let find = |aliases: &[&str]| {
        aliases
            .iter()
            .find_map(|alias| names.iter().position(|n| n == alias))
    };
    let sku = find(SKU_ALIASES)?;
    let qty = find(QTY_ALIASES)?;
    (sku != qty).then_some((sku, qty))
}

/// Whole, non-negative counts below [`MAX_COUNT`]. Spreadsheet exports like
/// `8.0` are accepted.
fn parse_qty(cell: &str) -> Result<i64, String> {
    let value = match cell.parse::<i64>() {
        Ok(v) => v,
        Err(_) => match cell.parse::<f64>() {
            Ok(f) if !f.is_finite() || f.fract() != 0.0 => {
                return Err(format!("quantity '{cell}' is not a whole number"));
            }
            Ok(f) if f.abs() >= MAX_COUNT as f64 => {
                return Err(format!("quantity '{cell}' is too large"));
            }
            Ok(f) => f as i64,
            Err(_) => return Err(format!("quantity '{cell}' is not a number")),
        },
    };
    if value < 0 {
        return Err(format!("quantity '{cell}' cannot be negative"));
    }
    if value >= MAX_COUNT {
        return Err(format!("quantity '{cell}' is too large"));
    }
    Ok(value)
}
