//! CSV export

use crate::crawler::Record;
use crate::output::traits::OutputHandler;
use crate::{OutputError, OutputResult};

/// Column order of the CSV export
pub const CSV_HEADERS: [&str; 8] = [
    "title",
    "rating",
    "rating_count",
    "year",
    "url",
    "cover",
    "quote",
    "info",
];

/// One row per record; absent fields are empty cells
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvOutput;

impl OutputHandler for CsvOutput {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn render(&self, records: &[Record]) -> OutputResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        // Written by hand so an empty run still produces a header row
        writer.write_record(CSV_HEADERS)?;
        for record in records {
            writer.serialize(record)?;
        }

        writer
            .into_inner()
            .map_err(|e| OutputError::Io(e.into_error()))
    }
}
