//! JSON export

use crate::crawler::Record;
use crate::output::traits::OutputHandler;
use crate::OutputResult;

/// A pretty-printed JSON array; absent fields are `null`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOutput;

impl OutputHandler for JsonOutput {
    fn name(&self) -> &'static str {
        "json"
    }

    fn render(&self, records: &[Record]) -> OutputResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(records)?)
    }
}
