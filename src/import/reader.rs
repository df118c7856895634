//! Tabular file reading (CSV and spreadsheets)
//!
//! Every supported format is reduced to the same shape: a header row and
//! a matrix of string cells, each row exactly as wide as the header.

use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::Timelike;
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info};

use crate::core::config::DEFAULT_DATE_FORMAT;
use crate::import::error::{ImportError, Result};

/// A file read into a header and rows of string cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    /// 1-based source line of each row
    lines: Vec<usize>,
}

impl ParsedTable {
    /// Build a table whose header is line 1 and whose rows follow it
    /// without gaps
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let lines = (2..rows.len() + 2).collect();
        Self::with_lines(header, rows, lines)
    }

    /// Build a table from rows tagged with their source line numbers.
    /// Short rows are padded with "" and long ones truncated.
    pub fn with_lines(header: Vec<String>, rows: Vec<Vec<String>>, lines: Vec<usize>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            header,
            rows,
            lines,
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Source line of row `idx`, counting from 1 like a spreadsheet
    pub fn line(&self, idx: usize) -> usize {
        self.lines.get(idx).copied().unwrap_or(idx + 2)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first header cell named `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

/// Result of reading a file that has a header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Header plus at least one data row
    Table(ParsedTable),
    /// The file has a header but no data rows
    HeaderOnly(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Csv,
    Workbook,
}

impl FileKind {
    fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(FileKind::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(FileKind::Workbook),
            _ => None,
        }
    }
}

/// Reads CSV and spreadsheet files into [`ParsedTable`]s
#[derive(Debug, Clone)]
pub struct TabularFileReader {
    delimiter: u8,
    date_format: String,
}

impl Default for TabularFileReader {
    fn default() -> Self {
        Self {
            delimiter: b',',
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl TabularFileReader {
    /// Create a reader with a CSV delimiter and a date pattern for
    /// spreadsheet date cells
    pub fn new(delimiter: char, date_format: impl Into<String>) -> Result<Self> {
        if !delimiter.is_ascii() {
            return Err(ImportError::validation(format!(
                "CSV delimiter must be a single ASCII character, got {:?}",
                delimiter
            )));
        }
        Ok(Self {
            delimiter: delimiter as u8,
            date_format: date_format.into(),
        })
    }

    /// Read a file, choosing the format from its extension
    pub fn read(&self, path: &Path) -> Result<ReadOutcome> {
        let kind = FileKind::detect(path).ok_or_else(|| ImportError::FileFormat {
            path: path.to_path_buf(),
            reason: "unsupported file extension".to_string(),
        })?;

        let raw = match kind {
            FileKind::Csv => self.read_csv(path)?,
            FileKind::Workbook => self.read_workbook(path)?,
        };

        let mut lines = raw
            .into_iter()
            .filter(|(_, row)| row.iter().any(|cell| !cell.is_empty()));

        let (_, header) = lines.next().ok_or_else(|| ImportError::FileFormat {
            path: path.to_path_buf(),
            reason: "file contains no rows".to_string(),
        })?;
        let (line_numbers, rows): (Vec<usize>, Vec<Vec<String>>) = lines.unzip();

        if rows.is_empty() {
            info!(path = %path.display(), "file has a header but no data rows");
            return Ok(ReadOutcome::HeaderOnly(header));
        }

        info!(
            path = %path.display(),
            columns = header.len(),
            rows = rows.len(),
            "read tabular file"
        );
        Ok(ReadOutcome::Table(ParsedTable::with_lines(
            header,
            rows,
            line_numbers,
        )))
    }

    /// Split lines on the delimiter. Quote characters are ordinary text.
    /// Each row is returned with its 1-based line number.
    fn read_csv(&self, path: &Path) -> Result<Vec<(usize, Vec<String>)>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .delimiter(self.delimiter)
            .from_path(path)
            .map_err(|e| ImportError::FileFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut rows = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| ImportError::FileFormat {
                path: path.to_path_buf(),
                reason: format!("line {}: {}", idx + 1, e),
            })?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 1);
            rows.push((line, record.iter().map(String::from).collect()));
        }
        debug!(lines = rows.len(), "parsed CSV lines");
        Ok(rows)
    }

    /// Read the first sheet of a workbook. The used range may start below
    /// the first sheet row; line numbers are sheet row numbers.
    fn read_workbook(&self, path: &Path) -> Result<Vec<(usize, Vec<String>)>> {
        let format_error = |reason: String| ImportError::FileFormat {
            path: path.to_path_buf(),
            reason,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| format_error(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| format_error("workbook has no worksheets".to_string()))?
            .map_err(|e| format_error(e.to_string()))?;

        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let rows = range
            .rows()
            .enumerate()
            .map(|(idx, row)| {
                let cells = row.iter().map(|cell| self.render_cell(cell)).collect();
                (first_row + idx + 1, cells)
            })
            .collect::<Vec<(usize, Vec<String>)>>();
        debug!(rows = rows.len(), "read first worksheet");
        Ok(rows)
    }

    fn render_cell(&self, cell: &Data) -> String {
        match cell {
            Data::String(s) => s.clone(),
            Data::Int(i) => i.to_string(),
            Data::Float(f) => format_number(*f),
            Data::Bool(b) => b.to_string(),
            Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
                Some(dt) if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 => {
                    dt.format(&self.date_format).to_string()
                }
                Some(dt) => dt
                    .format(&format!("{} %H:%M:%S", self.date_format))
                    .to_string(),
                None => cell.to_string(),
            },
            Data::Empty | Data::Error(_) => String::new(),
            other => other.to_string(),
        }
    }
}

/// Decimal rendering for numeric cells: integral values without a fraction
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn table(outcome: ReadOutcome) -> ParsedTable {
        match outcome {
            ReadOutcome::Table(t) => t,
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_csv_header_and_rows() {
        let tmp = tempdir().unwrap();
        let path = write(
            tmp.path(),
            "devices.csv",
            "AssetName,OS,Location\nPC1,Win10,HQ\nPC2,Win11,Lab\n",
        );

        let t = table(TabularFileReader::default().read(&path).unwrap());
        assert_eq!(t.header(), &["AssetName", "OS", "Location"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows()[1], vec!["PC2", "Win11", "Lab"]);
    }

    #[test]
    fn test_csv_lines_count_blank_lines() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "gaps.csv", "AssetName,OS\n\nPC1,Win10\n,Win11\n");

        let t = table(TabularFileReader::default().read(&path).unwrap());
        assert_eq!(t.len(), 2);
        assert_eq!(t.line(0), 3);
        assert_eq!(t.line(1), 4);
    }

    #[test]
    fn test_csv_pads_and_truncates_rows() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "ragged.csv", "A,B,C\n1\n1,2,3,4,5\n");

        let t = table(TabularFileReader::default().read(&path).unwrap());
        assert_eq!(t.rows()[0], vec!["1", "", ""]);
        assert_eq!(t.rows()[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_csv_has_no_quoting() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "quoted.csv", "Name,Note\nPC1,\"a,b\"\n");

        let t = table(TabularFileReader::default().read(&path).unwrap());
        assert_eq!(t.rows()[0], vec!["PC1", "\"a"]);
    }

    #[test]
    fn test_csv_custom_delimiter() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "semi.csv", "AssetName;OS\nPC1;Win10\n");

        let reader = TabularFileReader::new(';', "%Y-%m-%d").unwrap();
        let t = table(reader.read(&path).unwrap());
        assert_eq!(t.rows()[0], vec!["PC1", "Win10"]);
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let err = TabularFileReader::new('§', "%Y-%m-%d").unwrap_err();
        assert!(matches!(err, ImportError::Validation { .. }));
    }

    #[test]
    fn test_empty_file_is_format_error() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "empty.csv", "");

        let err = TabularFileReader::default().read(&path).unwrap_err();
        assert!(matches!(err, ImportError::FileFormat { .. }));
    }

    #[test]
    fn test_header_only_is_not_an_error() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "header.csv", "AssetName,OS\n\n");

        let outcome = TabularFileReader::default().read(&path).unwrap();
        assert_eq!(
            outcome,
            ReadOutcome::HeaderOnly(vec!["AssetName".to_string(), "OS".to_string()])
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "devices.json", "[]");

        let err = TabularFileReader::default().read(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported file extension"));
    }

    #[test]
    fn test_missing_file() {
        let err = TabularFileReader::default()
            .read(Path::new("/nonexistent/devices.csv"))
            .unwrap_err();
        assert!(matches!(err, ImportError::FileFormat { .. }));
    }

    #[test]
    fn test_corrupt_workbook() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "broken.xlsx", "not a zip archive");

        let err = TabularFileReader::default().read(&path).unwrap_err();
        assert!(matches!(err, ImportError::FileFormat { .. }));
    }

    /// Build an xlsx file with umya-spreadsheet; `fill` populates "Sheet1"
    fn write_workbook<F>(dir: &Path, fill: F) -> std::path::PathBuf
    where
        F: FnOnce(&mut umya_spreadsheet::Worksheet),
    {
        let path = dir.join("devices.xlsx");
        let mut book = umya_spreadsheet::new_file();
        fill(book.get_sheet_by_name_mut("Sheet1").unwrap());
        book.new_sheet("Other")
            .unwrap()
            .get_cell_mut("A1")
            .set_value_string("Ignored");
        umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();
        path
    }

    #[test]
    fn test_workbook_first_sheet_cells() {
        let tmp = tempdir().unwrap();
        let path = write_workbook(tmp.path(), |sheet| {
            for (cell, name) in [
                ("A1", "AssetName"),
                ("B1", "PurchaseDate"),
                ("C1", "LastSeen"),
                ("D1", "Ram"),
                ("E1", "Weight"),
                ("F1", "Managed"),
            ] {
                sheet.get_cell_mut(cell).set_value_string(name);
            }
            sheet.get_cell_mut("A2").set_value_string("PC1");
            sheet.get_cell_mut("B2").set_value_number(45292.0);
            sheet
                .get_style_mut("B2")
                .get_number_format_mut()
                .set_format_code("yyyy-mm-dd");
            sheet.get_cell_mut("C2").set_value_number(45292.5);
            sheet
                .get_style_mut("C2")
                .get_number_format_mut()
                .set_format_code("yyyy-mm-dd hh:mm:ss");
            sheet.get_cell_mut("D2").set_value_number(16.0);
            sheet.get_cell_mut("E2").set_value_number(3.5);
            sheet.get_cell_mut("F2").set_value_bool(true);
            sheet.get_cell_mut("A3").set_value_string("PC2");
        });

        let t = table(TabularFileReader::default().read(&path).unwrap());
        assert_eq!(
            t.header(),
            &["AssetName", "PurchaseDate", "LastSeen", "Ram", "Weight", "Managed"]
        );
        assert_eq!(
            t.rows()[0],
            vec!["PC1", "2024-01-01", "2024-01-01 12:00:00", "16", "3.5", "true"]
        );
        assert_eq!(t.rows()[1], vec!["PC2", "", "", "", "", ""]);
        assert_eq!(t.line(0), 2);
        assert_eq!(t.line(1), 3);
    }

    #[test]
    fn test_workbook_lines_follow_sheet_rows() {
        let tmp = tempdir().unwrap();
        let path = write_workbook(tmp.path(), |sheet| {
            sheet.get_cell_mut("A3").set_value_string("AssetName");
            sheet.get_cell_mut("B3").set_value_string("OS");
            sheet.get_cell_mut("A4").set_value_string("PC1");
            sheet.get_cell_mut("B4").set_value_string("Win10");
            sheet.get_cell_mut("A6").set_value_string("PC2");
            sheet.get_cell_mut("B6").set_value_string("Win11");
        });

        let t = table(TabularFileReader::default().read(&path).unwrap());
        assert_eq!(t.header(), &["AssetName", "OS"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.line(0), 4);
        assert_eq!(t.line(1), 6);
    }

    #[test]
    fn test_render_cells() {
        let reader = TabularFileReader::default();
        assert_eq!(reader.render_cell(&Data::Float(42.0)), "42");
        assert_eq!(reader.render_cell(&Data::Float(3.5)), "3.5");
        assert_eq!(reader.render_cell(&Data::Int(-7)), "-7");
        assert_eq!(reader.render_cell(&Data::Bool(true)), "true");
        assert_eq!(reader.render_cell(&Data::Bool(false)), "false");
        assert_eq!(reader.render_cell(&Data::Empty), "");
        assert_eq!(
            reader.render_cell(&Data::String("Win10".to_string())),
            "Win10"
        );
    }

    #[test]
    fn test_render_iso_dates() {
        let reader = TabularFileReader::new(',', "%m/%d/%Y").unwrap();
        assert_eq!(
            reader.render_cell(&Data::DateTimeIso("2023-04-05T00:00:00".to_string())),
            "04/05/2023"
        );
        assert_eq!(
            reader.render_cell(&Data::DateTimeIso("2023-04-05T13:45:10".to_string())),
            "04/05/2023 13:45:10"
        );
    }

    #[test]
    fn test_column_index_uses_first_occurrence() {
        let t = ParsedTable::new(
            vec!["Name".into(), "Name".into()],
            vec![vec!["a".into(), "b".into()]],
        );
        assert_eq!(t.column_index("Name"), Some(0));
        assert_eq!(t.column_index("Other"), None);
    }
}
