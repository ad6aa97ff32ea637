//! Output module for exporting extracted records
//!
//! This module handles:
//! - CSV export for spreadsheets and downstream analysis
//! - A numbered plain-text report
//! - A JSON array export
//!
//! All formats preserve the difference between an absent field and an
//! empty or zero value.

mod csv_output;
mod json;
mod text;
mod traits;

pub use csv_output::{CsvOutput, CSV_HEADERS};
pub use json::JsonOutput;
pub use text::{format_text_report, TextOutput};
pub use traits::OutputHandler;

use crate::config::OutputConfig;
use crate::crawler::Record;
use crate::OutputResult;
use std::path::PathBuf;

/// Writes the records in every configured format
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - The files written, in CSV, text, JSON order
/// * `Err(OutputError)` - A file could not be rendered or written
pub fn export_records(records: &[Record], config: &OutputConfig) -> OutputResult<Vec<PathBuf>> {
    let targets: [(&dyn OutputHandler, &str); 3] = [
        (&CsvOutput, config.csv_path.as_str()),
        (&TextOutput, config.text_path.as_str()),
        (&JsonOutput, config.json_path.as_str()),
    ];

    let mut written = Vec::with_capacity(targets.len());
    for (handler, path) in targets {
        let path = PathBuf::from(path);
        handler.write_to(records, &path)?;
        tracing::info!(
            "Wrote {} records as {} to {}",
            records.len(),
            handler.name(),
            path.display()
        );
        written.push(path);
    }

    Ok(written)
}
