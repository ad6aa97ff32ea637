//! Output handler trait
//!
//! Every export format renders the full record list to bytes; writing to a
//! path is shared.

use crate::crawler::Record;
use crate::OutputResult;
use std::path::Path;

/// An export format for extracted records
///
/// Implementations must keep absent fields distinguishable from empty
/// strings and zeros.
pub trait OutputHandler {
    /// Short format name used in log lines
    fn name(&self) -> &'static str;

    /// Renders all records in this format
    fn render(&self, records: &[Record]) -> OutputResult<Vec<u8>>;

    /// Renders and writes the records to `path`, replacing any existing file
    fn write_to(&self, records: &[Record], path: &Path) -> OutputResult<()> {
        let bytes = self.render(records)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
