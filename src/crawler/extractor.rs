//! Record extraction from listing HTML
//!
//! Containers are located with a primary selector and, only when that yields
//! nothing, a structurally different fallback selector. Each field of each
//! container is extracted independently: a missing or unparseable field
//! leaves that field empty and never affects its neighbours.

use chrono::Datelike;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// Earliest year accepted as a release year
pub const MIN_YEAR: i32 = 1870;

const PRIMARY_CONTAINER: &str = "div.item";
const FALLBACK_CONTAINER: &str = "ol.grid_view li";

/// One movie extracted from a listing page
///
/// `title` is always non-empty; every other field is absent when it could
/// not be extracted. Absent is distinct from an empty string or zero and is
/// preserved by every writer in [`crate::output`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    title: String,
    rating: Option<f64>,
    rating_count: Option<u64>,
    year: Option<i32>,
    url: Option<String>,
    #[serde(rename = "cover")]
    cover_image_url: Option<String>,
    quote: Option<String>,
    #[serde(rename = "info")]
    info_text: Option<String>,
}

impl Record {
    /// Starts a record; returns `None` for a blank title
    pub fn new(title: impl Into<String>) -> Option<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            title,
            rating: None,
            rating_count: None,
            year: None,
            url: None,
            cover_image_url: None,
            quote: None,
            info_text: None,
        })
    }

    pub fn with_rating(mut self, rating: Option<f64>) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_rating_count(mut self, count: Option<u64>) -> Self {
        self.rating_count = count;
        self
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_cover_image_url(mut self, url: Option<String>) -> Self {
        self.cover_image_url = url;
        self
    }

    pub fn with_quote(mut self, quote: Option<String>) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_info_text(mut self, info: Option<String>) -> Self {
        self.info_text = info;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn rating(&self) -> Option<f64> {
        self.rating
    }

    pub fn rating_count(&self) -> Option<u64> {
        self.rating_count
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn cover_image_url(&self) -> Option<&str> {
        self.cover_image_url.as_deref()
    }

    pub fn quote(&self) -> Option<&str> {
        self.quote.as_deref()
    }

    pub fn info_text(&self) -> Option<&str> {
        self.info_text.as_deref()
    }
}

/// Compiled selectors and patterns used to pull records out of a page
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    primary: Selector,
    fallback: Selector,
    title: Selector,
    rating: Selector,
    info: Selector,
    link: Selector,
    image: Selector,
    quote: Selector,
    rating_count: Regex,
    year: Regex,
}

impl RecordExtractor {
    /// Compiles all selectors and patterns
    pub fn new() -> Result<Self, String> {
        Ok(Self {
            primary: selector(PRIMARY_CONTAINER)?,
            fallback: selector(FALLBACK_CONTAINER)?,
            title: selector("span.title")?,
            rating: selector("span.rating_num")?,
            info: selector("div.bd")?,
            link: selector("a")?,
            image: selector("img")?,
            quote: selector("span.inq")?,
            // "<N>人评价" reads "N people rated"
            rating_count: Regex::new(r"(\d+)\s*人评价").map_err(|e| e.to_string())?,
            // A 19xx/20xx token not glued to other letters or digits
            year: Regex::new(r"(?:^|[^0-9A-Za-z])((?:19|20)\d{2})(?:[^0-9A-Za-z]|$)")
                .map_err(|e| e.to_string())?,
        })
    }

    /// Extracts every titled record from a page, in document order
    pub fn extract(&self, html: &str) -> Vec<Record> {
        let document = Html::parse_document(html);

        let mut containers: Vec<ElementRef<'_>> = document.select(&self.primary).collect();
        if containers.is_empty() {
            containers = document.select(&self.fallback).collect();
            if !containers.is_empty() {
                tracing::debug!(
                    "Primary container selector matched nothing, using fallback ({} nodes)",
                    containers.len()
                );
            }
        }

        containers
            .into_iter()
            .filter_map(|container| self.extract_one(container))
            .collect()
    }

    fn extract_one(&self, container: ElementRef<'_>) -> Option<Record> {
        let title = first_text(container, &self.title)?;
        let info_text = first_text(container, &self.info).map(|t| collapse_whitespace(&t));

        let year_source = match &info_text {
            Some(info) => info.clone(),
            None => collapse_whitespace(&container.text().collect::<String>()),
        };

        let record = Record::new(title)?
            .with_rating(self.extract_rating(container))
            .with_rating_count(self.extract_rating_count(container))
            .with_year(self.extract_year(&year_source))
            .with_url(self.extract_url(container))
            .with_cover_image_url(self.extract_cover(container))
            .with_quote(first_text(container, &self.quote))
            .with_info_text(info_text);

        Some(record)
    }

    fn extract_rating(&self, container: ElementRef<'_>) -> Option<f64> {
        first_text(container, &self.rating)?
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite())
    }

    fn extract_rating_count(&self, container: ElementRef<'_>) -> Option<u64> {
        container.text().find_map(|node| {
            self.rating_count
                .captures(node)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok())
        })
    }

    fn extract_year(&self, text: &str) -> Option<i32> {
        let current_year = chrono::Local::now().year();
        self.year
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .filter(|year| (MIN_YEAR..=current_year).contains(year))
    }

    fn extract_url(&self, container: ElementRef<'_>) -> Option<String> {
        container
            .select(&self.link)
            .next()?
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string)
    }

    fn extract_cover(&self, container: ElementRef<'_>) -> Option<String> {
        let img = container.select(&self.image).next()?;
        ["data-src", "src"]
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .map(str::trim)
            .find(|src| !src.is_empty())
            .map(str::to_string)
    }
}

/// Extracts records from listing HTML with a freshly compiled extractor
///
/// # Example
///
/// ```
/// use douban_top250::crawler::extract_records;
///
/// let html = r#"<div class="item"><span class="title">肖申克的救赎</span>
///     <span class="rating_num">9.7</span></div>"#;
/// let records = extract_records(html);
/// assert_eq!(records[0].title(), "肖申克的救赎");
/// assert_eq!(records[0].rating(), Some(9.7));
/// ```
pub fn extract_records(html: &str) -> Vec<Record> {
    match RecordExtractor::new() {
        Ok(extractor) => extractor.extract(html),
        Err(e) => {
            tracing::error!("Failed to build record extractor: {}", e);
            Vec::new()
        }
    }
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector '{}': {:?}", css, e))
}

/// Trimmed text of the first match, if non-empty
fn first_text(container: ElementRef<'_>, selector: &Selector) -> Option<String> {
    container
        .select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <ol class="grid_view">
          <li>
            <div class="item">
              <div class="pic">
                <em>1</em>
                <a href="https://movie.douban.com/subject/1292052/">
                  <img width="100" alt="肖申克的救赎" src="https://img.example/s1.jpg">
                </a>
              </div>
              <div class="info">
                <div class="hd">
                  <a href="https://movie.douban.com/subject/1292052/">
                    <span class="title">肖申克的救赎</span>
                    <span class="title">&nbsp;/&nbsp;The Shawshank Redemption</span>
                  </a>
                </div>
                <div class="bd">
                  <p>导演: 弗兰克·德拉邦特<br>
                     1994&nbsp;/&nbsp;美国&nbsp;/&nbsp;犯罪 剧情</p>
                  <div class="star">
                    <span class="rating5-t"></span>
                    <span class="rating_num" property="v:average">9.7</span>
                    <span>3054119人评价</span>
                  </div>
                  <p class="quote"><span class="inq">希望让人自由。</span></p>
                </div>
              </div>
            </div>
          </li>
          <li>
            <div class="item">
              <div class="pic">
                <a href="https://movie.douban.com/subject/1291546/">
                  <img data-src="https://img.example/lazy.jpg" src="https://img.example/placeholder.gif">
                </a>
              </div>
              <div class="info">
                <div class="hd"><span class="title">霸王别姬</span></div>
                <div class="bd">
                  <p>导演: 陈凯歌 1993 / 中国大陆 中国香港 / 剧情 爱情 同性</p>
                  <span class="rating_num">N/A</span>
                </div>
              </div>
            </div>
          </li>
        </ol>
        </body></html>
    "#;

    #[test]
    fn test_extract_full_record() {
        let records = extract_records(LISTING);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title(), "肖申克的救赎");
        assert_eq!(first.rating(), Some(9.7));
        assert_eq!(first.rating_count(), Some(3054119));
        assert_eq!(first.year(), Some(1994));
        assert_eq!(first.url(), Some("https://movie.douban.com/subject/1292052/"));
        assert_eq!(first.cover_image_url(), Some("https://img.example/s1.jpg"));
        assert_eq!(first.quote(), Some("希望让人自由。"));

        let info = first.info_text().unwrap();
        assert!(info.starts_with("导演: 弗兰克·德拉邦特"));
        assert!(!info.contains('\n'));
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let records = extract_records(LISTING);
        let second = &records[1];

        assert_eq!(second.title(), "霸王别姬");
        assert_eq!(second.rating(), None);
        assert_eq!(second.rating_count(), None);
        assert_eq!(second.quote(), None);
        assert_eq!(second.year(), Some(1993));
    }

    #[test]
    fn test_cover_prefers_data_src() {
        let records = extract_records(LISTING);
        assert_eq!(
            records[1].cover_image_url(),
            Some("https://img.example/lazy.jpg")
        );
    }

    #[test]
    fn test_three_titled_containers_and_one_untitled() {
        let html = r#"
            <div class="item"><span class="title">A</span><span class="rating_num">9.1</span></div>
            <div class="item"><span class="title">B</span></div>
            <div class="item"><span class="title">C</span><span class="rating_num">7.5</span></div>
            <div class="item"><span class="rating_num">8.0</span></div>
        "#;
        let records = extract_records(html);

        let titles: Vec<&str> = records.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert_eq!(records[0].rating(), Some(9.1));
        assert_eq!(records[1].rating(), None);
        assert_eq!(records[2].rating(), Some(7.5));
    }

    #[test]
    fn test_blank_title_is_discarded() {
        let html = r#"
            <div class="item"><span class="title">   </span><span class="rating_num">9.0</span></div>
            <div class="item"><span class="title">Kept</span></div>
        "#;
        let records = extract_records(html);
        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|r| !r.title().is_empty()));
    }

    #[test]
    fn test_fallback_selector_used_when_primary_empty() {
        let html = r#"
            <ol class="grid_view">
              <li><span class="title">Fallback One</span><span class="rating_num">8.8</span></li>
              <li><span class="title">Fallback Two</span></li>
            </ol>
        "#;
        let records = extract_records(html);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title(), "Fallback One");
        assert_eq!(records[0].rating(), Some(8.8));
    }

    #[test]
    fn test_fallback_not_used_when_primary_matches() {
        // The <li> without a div.item would be picked up by the fallback
        let html = r#"
            <ol class="grid_view">
              <li><div class="item"><span class="title">Primary</span></div></li>
              <li><span class="title">Only In Fallback</span></li>
            </ol>
        "#;
        let records = extract_records(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title(), "Primary");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(extract_records(LISTING), extract_records(LISTING));
    }

    #[test]
    fn test_no_containers() {
        assert!(extract_records("<html><body><p>nothing</p></body></html>").is_empty());
        assert!(extract_records("").is_empty());
    }

    #[test]
    fn test_year_uses_info_block_not_title() {
        let html = r#"
            <div class="item">
              <span class="title">2046</span>
              <div class="bd"><p>导演: 王家卫 2004 / 中国香港</p></div>
            </div>
        "#;
        let records = extract_records(html);
        assert_eq!(records[0].year(), Some(2004));
    }

    #[test]
    fn test_year_without_info_block_searches_container() {
        let html = r#"<div class="item"><span class="title">X</span><p>上映 1999年</p></div>"#;
        let records = extract_records(html);
        assert_eq!(records[0].year(), Some(1999));
    }

    #[test]
    fn test_year_ignores_longer_digit_runs() {
        let html = r#"
            <div class="item"><span class="title">X</span>
              <div class="bd"><p>编号 199412 / 2001</p></div>
            </div>
        "#;
        let records = extract_records(html);
        assert_eq!(records[0].year(), Some(2001));
    }

    #[test]
    fn test_implausible_year_is_absent() {
        let html = r#"
            <div class="item"><span class="title">X</span>
              <div class="bd"><p>2999 / 未来</p></div>
            </div>
        "#;
        let records = extract_records(html);
        assert_eq!(records[0].year(), None);
    }

    #[test]
    fn test_record_new_rejects_blank_title() {
        assert!(Record::new("").is_none());
        assert!(Record::new(" \t").is_none());
        assert_eq!(Record::new(" A ").unwrap().title(), "A");
    }
}
