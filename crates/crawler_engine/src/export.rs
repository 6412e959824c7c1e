use std::path::{Path, PathBuf};

use crawl_logging::{crawl_error, crawl_info, crawl_warn};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::context::ResultSet;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::settings::ExportOptions;
use crate::types::{ExportSummary, JobRecord};

/// Record fields and their spreadsheet headers, in column order.
pub const COLUMNS: [(&str, &str); 9] = [
    ("title", "채용공고명"),
    ("company", "업체명"),
    ("salary", "급여"),
    ("location", "지역"),
    ("schedule", "근무시간"),
    ("industry", "업종"),
    ("employees", "인원수"),
    ("fax", "팩스번호"),
    ("address", "주소"),
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] XlsxError),
}

impl ExportError {
    pub fn is_locked(&self) -> bool {
        matches!(self, ExportError::Persist(PersistError::Locked { .. }))
    }
}

/// Flat rows under their presentation headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn from_records(records: &[JobRecord]) -> Self {
        Self {
            headers: COLUMNS.iter().map(|(_, label)| label.to_string()).collect(),
            rows: records
                .iter()
                .map(|record| record.values().iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }
}

pub trait SpreadsheetWriter: Send + Sync {
    /// Writes `table` to `{dir}/{file_name}` and returns the final path.
    fn write(
        &self,
        dir: &Path,
        file_name: &str,
        sheet_name: &str,
        table: &ExportTable,
    ) -> Result<PathBuf, ExportError>;
}

/// `.xlsx` output with a bold header row.
#[derive(Debug, Default)]
pub struct XlsxWriter;

impl SpreadsheetWriter for XlsxWriter {
    fn write(
        &self,
        dir: &Path,
        file_name: &str,
        sheet_name: &str,
        table: &ExportTable,
    ) -> Result<PathBuf, ExportError> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name)?;

        for (col, header) in table.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        }
        for (row, values) in table.rows.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                worksheet.write_string(row as u32 + 1, col as u16, value)?;
            }
        }

        let buffer = workbook.save_to_buffer()?;
        let path = AtomicFileWriter::new(dir.to_path_buf()).write(file_name, &buffer)?;
        Ok(path)
    }
}

/// Sanitized records plus the result of writing them out.
#[derive(Debug)]
pub struct Finalized {
    pub records: Vec<JobRecord>,
    pub export: Result<ExportSummary, ExportError>,
}

/// Sanitizes every collected record and writes the spreadsheet.
///
/// A locked output file is retried once under the fallback name. The
/// sanitized records are returned whether or not the write succeeded.
pub fn finalize(
    results: &ResultSet,
    options: &ExportOptions,
    writer: &dyn SpreadsheetWriter,
) -> Finalized {
    let records: Vec<JobRecord> = results
        .snapshot()
        .iter()
        .map(JobRecord::sanitized)
        .collect();
    let table = ExportTable::from_records(&records);
    let row_count = table.rows.len();

    let write = |file_name: &str| {
        writer.write(&options.output_dir, file_name, &options.sheet_name, &table)
    };

    let export = match write(&options.file_name) {
        Ok(path) => Ok(ExportSummary {
            row_count,
            path,
            used_fallback: false,
        }),
        Err(err) if err.is_locked() => {
            crawl_warn!(
                "{} is open in another program; saving as {} instead",
                options.file_name,
                options.fallback_file_name
            );
            write(&options.fallback_file_name).map(|path| ExportSummary {
                row_count,
                path,
                used_fallback: true,
            })
        }
        Err(err) => Err(err),
    };

    match &export {
        Ok(summary) => crawl_info!("saved {} rows to {}", row_count, summary.path.display()),
        Err(err) => crawl_error!(
            "could not save results ({} rows kept in memory): {}",
            row_count,
            err
        ),
    }

    Finalized { records, export }
}
