//! Plain-text report
//!
//! One numbered line per movie, in crawl order:
//!
//! ```text
//! 001. 《肖申克的救赎》 | 评分：9.7 | 评价人数：3054119 | 年份：1994 | 短评：希望让人自由。
//! ```
//!
//! Labels read rating, number of ratings, year and short review. Absent
//! values leave the slot after the colon empty.

use crate::crawler::Record;
use crate::output::traits::OutputHandler;
use crate::OutputResult;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, Default)]
pub struct TextOutput;

impl OutputHandler for TextOutput {
    fn name(&self) -> &'static str {
        "text"
    }

    fn render(&self, records: &[Record]) -> OutputResult<Vec<u8>> {
        Ok(format_text_report(records).into_bytes())
    }
}

/// Formats the numbered report
pub fn format_text_report(records: &[Record]) -> String {
    let mut out = String::new();

    for (idx, record) in records.iter().enumerate() {
        out.push_str(&format!(
            "{:03}. 《{}》 | 评分：{} | 评价人数：{} | 年份：{} | 短评：{}\n",
            idx + 1,
            record.title(),
            record
                .rating()
                .map(|r| format!("{:.1}", r))
                .unwrap_or_default(),
            or_blank(record.rating_count()),
            or_blank(record.year()),
            record.quote().unwrap_or(""),
        ));
    }

    out
}

fn or_blank<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
