//! Minimal CSV reader for the labelled test set.
//!
//! Handles a header row, quoted fields (with `""` escapes and embedded
//! commas or newlines), and CRLF line endings. Every record must have the
//! same number of fields as the header.

use std::path::Path;

use super::CheckError;

/// A parsed CSV table: header plus string cells.
#[derive(Debug, Clone)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    /// 1-based source line where each row starts.
    lines: Vec<usize>,
}

impl Table {
    pub fn load(path: &Path) -> Result<Self, CheckError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CheckError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(text: &str) -> Result<Self, CheckError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut records = parse_records(text)?.into_iter();

        let (_, header) = records.next().ok_or(CheckError::EmptyDataset)?;
        let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();

        let mut rows = Vec::new();
        let mut lines = Vec::new();
        for (line, record) in records {
            if record.len() != header.len() {
                return Err(CheckError::Csv {
                    line,
                    message: format!("expected {} fields, found {}", header.len(), record.len()),
                });
            }
            rows.push(record);
            lines.push(line);
        }
        if rows.is_empty() {
            return Err(CheckError::EmptyDataset);
        }
        Ok(Self {
            header,
            rows,
            lines,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Source line of row `index`, for error messages.
    pub fn line(&self, index: usize) -> usize {
        self.lines[index]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Reads an integer class label from every row of `column`.
    ///
    /// Accepts `1` as well as float spellings such as `1.0`.
    pub fn labels(&self, column: &str) -> Result<Vec<i64>, CheckError> {
        let c = self
            .column_index(column)
            .ok_or_else(|| CheckError::MissingColumn(column.to_string()))?;

        self.rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let cell = row[c].trim();
                parse_label(cell).ok_or_else(|| CheckError::Csv {
                    line: self.line(r),
                    message: format!("invalid label '{}' in column '{}'", cell, column),
                })
            })
            .collect()
    }
}

fn parse_label(cell: &str) -> Option<i64> {
    if let Ok(v) = cell.parse::<i64>() {
        return Some(v);
    }
    let v = cell.parse::<f64>().ok()?;
    (v.fract() == 0.0 && v.is_finite()).then_some(v as i64)
}

/// Splits `text` into records, each tagged with its 1-based starting line.
/// Blank lines are skipped.
fn parse_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, CheckError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut start_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                finish_record(&mut records, &mut record, &mut field, start_line);
                line += 1;
                start_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CheckError::Csv {
            line: start_line,
            message: "unterminated quoted field".into(),
        });
    }
    finish_record(&mut records, &mut record, &mut field, start_line);
    Ok(records)
}

fn finish_record(
    records: &mut Vec<(usize, Vec<String>)>,
    record: &mut Vec<String>,
    field: &mut String,
    line: usize,
) {
    if record.is_empty() && field.is_empty() {
        return;
    }
    record.push(std::mem::take(field));
    records.push((line, std::mem::take(record)));
}
